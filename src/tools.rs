use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::availability::{available_slots, slot_is_available};
use crate::catalog::{CatalogError, ServiceSource};
use crate::ledger::{Ledger, LedgerError};
use crate::limits::MAX_MESSAGE_LEN;
use crate::model::{Service, ServiceId};
use crate::schedule::{ScheduleError, ScheduleFormat, format_span, parse_slot};

pub const LIST_SERVICES: &str = "list_services";
pub const LIST_RECORDS: &str = "list_records";
pub const LIST_AVAILABLE_SLOTS: &str = "list_available_slots";
pub const CREATE_RECORD: &str = "create_record";
pub const TERMINATE: &str = "terminate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    String,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolSpec {
    /// JSON-schema `parameters` object, as function-calling APIs expect it.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in self.params {
            let ty = match p.kind {
                ParamKind::Integer => "integer",
                ParamKind::String => "string",
            };
            properties.insert(p.name.into(), json!({ "type": ty, "description": p.description }));
        }
        let required: Vec<&str> = self.params.iter().map(|p| p.name).collect();
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

const SERVICE_ID_PARAM: ParamSpec = ParamSpec {
    name: "service_id",
    kind: ParamKind::Integer,
    description: "id of the service, from list_services",
};

/// Every operation the model may call. A raw `ToolInvocation` is checked
/// against this table and turned into a `ToolCall` before anything runs.
pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: LIST_SERVICES,
        description: "List all bookable services with their schedule and duration in minutes.",
        params: &[],
    },
    ToolSpec {
        name: LIST_RECORDS,
        description: "List all booked records and their slots.",
        params: &[],
    },
    ToolSpec {
        name: LIST_AVAILABLE_SLOTS,
        description: "List the free windows of one service that are at least its duration long.",
        params: &[SERVICE_ID_PARAM],
    },
    ToolSpec {
        name: CREATE_RECORD,
        description: "Book a slot of a service. Fails if the slot is taken or outside the schedule.",
        params: &[
            SERVICE_ID_PARAM,
            ParamSpec {
                name: "slot",
                kind: ParamKind::String,
                description: "time slot, format 2026-02-01 09:00-09:30, UTC+3",
            },
        ],
    },
    ToolSpec {
        name: TERMINATE,
        description: "End the conversation and show the message to the user.",
        params: &[ParamSpec {
            name: "message",
            kind: ParamKind::String,
            description: "final answer for the user",
        }],
    },
];

pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name == name)
}

/// A tool call as the model wrote it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// A validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ListServices,
    ListRecords,
    ListAvailableSlots { service_id: ServiceId },
    CreateRecord { service_id: ServiceId, slot: String },
    Terminate { message: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
    #[error("unknown service {0}")]
    UnknownService(ServiceId),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("slot {slot} of service {service_id} is already booked")]
    SlotAlreadyBooked { service_id: ServiceId, slot: String },
    #[error("slot {slot} of service {service_id} is not available")]
    SlotNotAvailable { service_id: ServiceId, slot: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("booking ledger failure: {0}")]
    Ledger(LedgerError),
}

fn invalid(tool: &'static str, reason: impl Into<String>) -> ToolError {
    ToolError::InvalidArguments {
        tool,
        reason: reason.into(),
    }
}

fn integer_arg(spec: &ToolSpec, args: &Map<String, Value>, name: &str) -> Result<ServiceId, ToolError> {
    let value = args.get(name).ok_or_else(|| invalid(spec.name, format!("missing `{name}`")))?;
    value
        .as_u64()
        .and_then(|n| ServiceId::try_from(n).ok())
        .ok_or_else(|| invalid(spec.name, format!("`{name}` must be a non-negative integer, got {value}")))
}

fn string_arg(spec: &ToolSpec, args: &Map<String, Value>, name: &str) -> Result<String, ToolError> {
    let value = args.get(name).ok_or_else(|| invalid(spec.name, format!("missing `{name}`")))?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid(spec.name, format!("`{name}` must be a string, got {value}")))
}

impl ToolCall {
    /// Validate a raw invocation against the declared table.
    /// Unexpected extra arguments are ignored.
    pub fn from_invocation(inv: &ToolInvocation) -> Result<Self, ToolError> {
        let spec = find_tool(&inv.tool_name).ok_or_else(|| ToolError::UnknownTool(inv.tool_name.clone()))?;
        let args = &inv.args;
        let call = match spec.name {
            LIST_SERVICES => ToolCall::ListServices,
            LIST_RECORDS => ToolCall::ListRecords,
            LIST_AVAILABLE_SLOTS => ToolCall::ListAvailableSlots {
                service_id: integer_arg(spec, args, "service_id")?,
            },
            CREATE_RECORD => ToolCall::CreateRecord {
                service_id: integer_arg(spec, args, "service_id")?,
                slot: string_arg(spec, args, "slot")?,
            },
            TERMINATE => {
                let message = string_arg(spec, args, "message")?;
                if message.len() > MAX_MESSAGE_LEN {
                    return Err(invalid(spec.name, "`message` too long"));
                }
                ToolCall::Terminate { message }
            }
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(call)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ListServices => LIST_SERVICES,
            ToolCall::ListRecords => LIST_RECORDS,
            ToolCall::ListAvailableSlots { .. } => LIST_AVAILABLE_SLOTS,
            ToolCall::CreateRecord { .. } => CREATE_RECORD,
            ToolCall::Terminate { .. } => TERMINATE,
        }
    }
}

/// A booking as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub user_id: String,
    pub service_id: ServiceId,
    pub slot: String,
}

/// Executes validated calls against the catalog and the ledger.
pub struct ToolRegistry {
    catalog: Arc<dyn ServiceSource>,
    ledger: Arc<Ledger>,
    format: ScheduleFormat,
}

impl ToolRegistry {
    pub fn new(catalog: Arc<dyn ServiceSource>, ledger: Arc<Ledger>, format: ScheduleFormat) -> Self {
        Self { catalog, ledger, format }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn validate(&self, inv: &ToolInvocation) -> Result<ToolCall, ToolError> {
        ToolCall::from_invocation(inv).inspect_err(|e| {
            metrics::counter!(crate::observability::TOOL_CALLS_TOTAL,
                "tool" => "invalid", "status" => "error")
            .increment(1);
            tracing::warn!(tool = %inv.tool_name, "rejected tool call: {e}");
        })
    }

    /// Validate then execute. Nothing runs if validation fails.
    pub async fn invoke(&self, inv: &ToolInvocation) -> Result<Value, ToolError> {
        let call = self.validate(inv)?;
        self.execute(&call).await
    }

    pub async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let result = match call {
            ToolCall::ListServices => self.list_services(),
            ToolCall::ListRecords => self.list_records().await,
            ToolCall::ListAvailableSlots { service_id } => self.list_available_slots(*service_id).await,
            ToolCall::CreateRecord { service_id, slot } => self.create_record(*service_id, slot).await,
            ToolCall::Terminate { message } => Ok(json!({ "message": message })),
        };
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(crate::observability::TOOL_CALLS_TOTAL,
            "tool" => call.name(), "status" => status)
        .increment(1);
        if let Err(e) = &result {
            tracing::warn!(tool = call.name(), "tool call failed: {e}");
        }
        result
    }

    fn service(&self, service_id: ServiceId) -> Result<Service, ToolError> {
        self.catalog
            .find(service_id)?
            .ok_or(ToolError::UnknownService(service_id))
    }

    fn list_services(&self) -> Result<Value, ToolError> {
        Ok(json!(self.catalog.load()?))
    }

    async fn list_records(&self) -> Result<Value, ToolError> {
        let rows: Vec<RecordRow> = self
            .ledger
            .list_bookings()
            .await
            .into_iter()
            .map(|b| RecordRow {
                user_id: b.user_id.to_string(),
                service_id: b.service_id,
                slot: format_span(&b.slot, &self.format),
            })
            .collect();
        Ok(json!(rows))
    }

    async fn list_available_slots(&self, service_id: ServiceId) -> Result<Value, ToolError> {
        let service = self.service(service_id)?;
        let booked = self.ledger.bookings_for(service_id).await;
        let slots: Vec<String> = available_slots(&service, &booked, &self.format)?
            .map(|s| format_span(&s, &self.format))
            .collect();
        Ok(json!({
            "service_id": service_id,
            "duration_minutes": service.duration_minutes,
            "slots": slots,
        }))
    }

    async fn create_record(&self, service_id: ServiceId, slot_text: &str) -> Result<Value, ToolError> {
        let service = self.service(service_id)?;
        let slot = parse_slot(slot_text, &self.format)?;
        let canonical = format_span(&slot, &self.format);

        if self.ledger.has_conflict(service_id, &slot).await {
            return Err(ToolError::SlotAlreadyBooked {
                service_id,
                slot: canonical,
            });
        }
        let booked = self.ledger.bookings_for(service_id).await;
        if !slot_is_available(&service, &booked, &slot, &self.format)? {
            return Err(ToolError::SlotNotAvailable {
                service_id,
                slot: canonical,
            });
        }

        // The ledger re-checks under its lock; a concurrent writer may have won.
        let booking = self.ledger.append(service_id, slot).await.map_err(|e| match e {
            LedgerError::SlotAlreadyBooked { .. } => ToolError::SlotAlreadyBooked {
                service_id,
                slot: canonical.clone(),
            },
            other => ToolError::Ledger(other),
        })?;
        let record = RecordRow {
            user_id: booking.user_id.to_string(),
            service_id,
            slot: canonical,
        };
        Ok(json!({ "status": "created", "record": record }))
    }
}

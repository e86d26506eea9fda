use std::fmt::Write;

use super::client::ToolMode;
use super::reply::ACTION_BLOCK;
use crate::tools::{ParamKind, TOOLS};

const ROLE: &str = "\
You are a booking agent. You book users into services and help them find out \
which services they can book and when.";

const GUIDANCE: &str = "\
All times are wall-clock times in the UTC+3 timezone. Schedules look like \
`2026-02-01 09:00-13:00 14:00-16:00|2026-02-02 10:00-14:00`; a slot looks like \
`2026-02-01 09:00-09:30` and must last at least the service duration.

To find a free slot, call list_available_slots for the service, or read its \
schedule and duration from list_services and subtract the bookings from \
list_records. Then book it with create_record.

When you have the answer to the user's question, always call terminate with \
the answer as the message. If the user asks about something other than \
services or booking, call terminate.";

/// System instructions for one session.
pub fn system_instructions(mode: ToolMode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{ROLE}\n\nAvailable tools:");
    for tool in TOOLS {
        let params: Vec<String> = tool
            .params
            .iter()
            .map(|p| {
                let ty = match p.kind {
                    ParamKind::Integer => "int",
                    ParamKind::String => "str",
                };
                format!("{}: {ty}", p.name)
            })
            .collect();
        let _ = writeln!(out, "- {}({}): {}", tool.name, params.join(", "), tool.description);
        for p in tool.params {
            let _ = writeln!(out, "    {}: {}", p.name, p.description);
        }
    }
    let _ = write!(out, "\n{GUIDANCE}\n");

    if mode == ToolMode::Text {
        let _ = write!(
            out,
            "\nEvery response MUST contain exactly one action. Respond in this format:\n\n\
             ```{ACTION_BLOCK}\n\
             {{\n  \"tool_name\": \"insert tool_name\",\n  \"args\": {{...fill in any required arguments here...}}\n}}\n\
             ```\n"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_every_tool() {
        let text = system_instructions(ToolMode::Native);
        for tool in TOOLS {
            assert!(text.contains(tool.name), "missing {}", tool.name);
        }
        assert!(text.contains("create_record(service_id: int, slot: str)"));
        assert!(!text.contains("```action"));
    }

    #[test]
    fn text_mode_describes_action_format() {
        let text = system_instructions(ToolMode::Text);
        assert!(text.contains("```action"));
        assert!(text.contains("\"tool_name\""));
    }
}

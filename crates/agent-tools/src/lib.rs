//! # agent-tools
//!
//! Built-in tools for the tool agent.
//!
//! | Tool                     | Kind  | Result                     |
//! |--------------------------|-------|----------------------------|
//! | `multiply`               | async | `{"product": a * b}`       |
//! | `generate_random_number` | async | `{"random_number": n}`     |
//! | `datetime`               | sync  | `{"datetime": "..."}`      |

mod datetime;
mod multiply;
mod random_number;

pub use datetime::datetime_tool;
pub use multiply::MultiplyTool;
pub use random_number::RandomNumberTool;

use agent_core::ToolRegistry;

/// Registry with every built-in tool
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(MultiplyTool);
    registry.register(RandomNumberTool);
    registry.register(datetime_tool());
    registry
}

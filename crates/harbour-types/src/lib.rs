//! Shared record model for the Harbour log pipeline.
//!
//! Producers build [`LogRecord`]s, the ingestion pipeline ships them over the
//! event bus as JSON, and the query layer reads them back from the search
//! store. Every crate in the workspace speaks these types.
//!
//! | Log type | Payload | Priority |
//! |----------|---------|----------|
//! | `ACTIVITY` | free-form string | yes |
//! | `CHANGE` | entity, op and field changes | no |
//! | `DEBUG` | pid, runtime, caller location, stack trace, data | yes |

mod field;
mod priority;
mod record;
mod time;

pub use field::{LogField, UnknownFieldError};
pub use priority::{LogType, ParseLevelError, Priority, Status};
pub use record::{new_record_id, ChangeDetail, ChangeInfo, DebugInfo, LogPayload, LogRecord};
pub use time::{monotonic_now, parse_timestamp, to_sortable, TimestampError};

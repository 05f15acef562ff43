mod command_input;
mod form;
mod input;
mod key_result;
mod review_editor;

pub use command_input::{CommandEvent, CommandInput};
pub use form::{Field, FieldForm, FieldKind, FormEvent};
pub use key_result::KeyResult;
pub use review_editor::ReviewEditor;

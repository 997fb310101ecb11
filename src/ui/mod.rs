pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{header, muted, status, success, warn};
pub use table::{stats_table, variables_table, TableBuilder, VariableRow};
pub use theme::{theme, Theme};

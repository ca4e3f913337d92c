pub(crate) mod command;
pub(crate) mod listen;
pub(crate) mod params;
pub(crate) mod ui;

pub use self::command::{Args, Command, LogLevel, OutputFormat, Target};
pub use self::listen::ListenArgs;
pub use self::params::{GetArgs, SetArgs};

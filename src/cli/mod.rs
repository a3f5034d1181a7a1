pub mod args;
pub mod meeting;
pub mod status;

pub use args::{Cli, CliCommand, CreateMeetingArgs, MeetingCliArgs, MeetingCommand, ServeCliArgs};
pub use meeting::handle_meeting_command;
pub use status::handle_status_command;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "meetsync")]
#[command(about = "Live sync for collaborative meetings", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the sync service for one meeting
    Serve(ServeCliArgs),
    /// Create, list and inspect meetings
    Meeting(MeetingCliArgs),
    /// Show the live state of the running service
    Status,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct ServeCliArgs {
    /// Meeting code to sync (10 chars, A-Z0-9)
    pub meeting: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct MeetingCliArgs {
    #[command(subcommand)]
    pub command: MeetingCommand,
}

#[derive(Subcommand, Debug)]
pub enum MeetingCommand {
    /// Create a meeting (interactive for anything not given as a flag)
    Create(CreateMeetingArgs),
    /// List meetings that are not completed yet
    List {
        /// Maximum number of meetings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one meeting with agenda, participants and questions
    Show {
        /// Meeting code
        id: String,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct CreateMeetingArgs {
    /// Meeting title
    #[arg(short, long)]
    pub title: Option<String>,
    /// Start, "YYYY-MM-DD HH:MM" (UTC)
    #[arg(long)]
    pub start: Option<String>,
    /// End, "YYYY-MM-DD HH:MM" (UTC)
    #[arg(long)]
    pub end: Option<String>,
    /// Where the meeting happens (room, link, ...)
    #[arg(long)]
    pub location: Option<String>,
    /// Free-text description
    #[arg(long)]
    pub description: Option<String>,
    /// Participant email, repeatable
    #[arg(short, long = "participant")]
    pub participants: Vec<String>,
}

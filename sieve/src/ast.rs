//! The command tree produced by the parser (§3: "Script... command tree").
//!
//! Every string carried by a node is the *raw* source text: it may still
//! contain `${name}` variable references and is only interpolated against
//! the active [`crate::variables::Variables`] frames at evaluation time
//! (§4.3: "any string value encountered at runtime is expanded against the
//! active variable frames prior to use").

pub type Block = Vec<Command>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchType {
    Is,
    Contains,
    Matches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressPart {
    All,
    LocalPart,
    Domain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Test {
    True,
    False,
    Not(Box<Test>),
    AnyOf(Vec<Test>),
    AllOf(Vec<Test>),
    Header {
        names: Vec<String>,
        match_type: MatchType,
        keys: Vec<String>,
    },
    Address {
        part: AddressPart,
        names: Vec<String>,
        match_type: MatchType,
        keys: Vec<String>,
    },
    Envelope {
        part: AddressPart,
        names: Vec<String>,
        match_type: MatchType,
        keys: Vec<String>,
    },
    Exists(Vec<String>),
    Size {
        over: bool,
        limit: u64,
    },
    Duplicate {
        handle: Option<String>,
        seconds: Option<u64>,
        header: Option<String>,
        unique_id: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlagArgs {
    pub variable: Option<String>,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VacationArgs {
    pub reason: String,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub handle: Option<String>,
    pub days: Option<u32>,
    pub addresses: Vec<String>,
    pub mime: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotifyArgs {
    pub method: String,
    pub from: Option<String>,
    pub options: Vec<String>,
    pub priority: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DenotifyArgs {
    pub method: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnoozeArgs {
    pub mailbox: Option<String>,
    pub flags: Vec<String>,
    pub addflags: bool,
    pub tzid: Option<String>,
    pub times: Vec<String>,
    pub days: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    If {
        branches: Vec<(Test, Block)>,
        otherwise: Option<Block>,
    },
    Require(Vec<String>),
    Stop,
    Keep {
        flags: Vec<String>,
    },
    Discard,
    FileInto {
        mailbox: String,
        flags: Vec<String>,
        copy: bool,
        create: bool,
    },
    Redirect {
        address: String,
        copy: bool,
        list_id: Option<String>,
    },
    Reject {
        reason: String,
        extended: bool,
    },
    SetFlag(FlagArgs),
    AddFlag(FlagArgs),
    RemoveFlag(FlagArgs),
    Mark,
    Unmark,
    Vacation(VacationArgs),
    Notify(NotifyArgs),
    Denotify(DenotifyArgs),
    Snooze(SnoozeArgs),
    Set {
        variable: String,
        value: String,
    },
    Include {
        path: String,
        once: bool,
    },
}

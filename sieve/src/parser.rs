//! Recursive-descent parser building an [`ast::Block`] from the token
//! stream produced by [`crate::lexer`].
//!
//! Errors are collected rather than returned on the first failure (§4.1:
//! "parsing continues past errors when the grammar permits, to report as
//! many as possible") — except for an unsupported `require`, which aborts
//! the whole parse immediately per the "Require unknown" scenario in the
//! spec's testable properties.

use std::collections::HashMap;

use sieve_types::capability::{Extension, ExtensionSet};

use crate::ast::{
    AddressPart, Block, Command, DenotifyArgs, FlagArgs, MatchType, NotifyArgs, SnoozeArgs, Test,
    VacationArgs,
};
use crate::lexer::{Spanned, Token};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    pub line: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct ParseOutcome {
    pub block: Block,
    pub support: ExtensionSet,
    pub issues: Vec<ParseIssue>,
    pub fatal: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum ArgValue {
    Str(String),
    StrList(Vec<String>),
    Num(u64),
}

impl ArgValue {
    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::StrList(mut list) => list.drain(..).next().unwrap_or_default(),
            Self::Num(n) => n.to_string(),
        }
    }

    fn into_string_list(self) -> Vec<String> {
        match self {
            Self::Str(s) => vec![s],
            Self::StrList(list) => list,
            Self::Num(n) => vec![n.to_string()],
        }
    }

    fn as_num(&self) -> Option<u64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
            Self::StrList(_) => None,
        }
    }
}

#[derive(Default)]
struct Args {
    tags: HashMap<String, Option<ArgValue>>,
    positionals: Vec<ArgValue>,
}

impl Args {
    fn take_tag_string(&mut self, name: &str) -> Option<String> {
        self.tags
            .remove(name)
            .flatten()
            .map(ArgValue::into_string)
    }

    fn take_tag_list(&mut self, name: &str) -> Option<Vec<String>> {
        self.tags
            .remove(name)
            .flatten()
            .map(ArgValue::into_string_list)
    }

    fn take_tag_num(&mut self, name: &str) -> Option<u64> {
        self.tags.remove(name).flatten().and_then(|v| v.as_num())
    }

    fn has_flag(&mut self, name: &str) -> bool {
        self.tags.remove(name).is_some()
    }

    fn positional_string(&mut self, index: usize) -> String {
        self.positionals
            .get(index)
            .cloned()
            .map(ArgValue::into_string)
            .unwrap_or_default()
    }

    fn positional_list(&mut self, index: usize) -> Vec<String> {
        self.positionals
            .get(index)
            .cloned()
            .map(ArgValue::into_string_list)
            .unwrap_or_default()
    }

    fn match_type(&mut self) -> MatchType {
        if self.has_flag("matches") {
            MatchType::Matches
        } else if self.has_flag("contains") {
            MatchType::Contains
        } else {
            self.has_flag("is");
            MatchType::Is
        }
    }

    fn address_part(&mut self) -> AddressPart {
        if self.has_flag("domain") {
            AddressPart::Domain
        } else if self.has_flag("localpart") {
            AddressPart::LocalPart
        } else {
            self.has_flag("all");
            AddressPart::All
        }
    }
}

const TAGS_WITH_STRING_VALUE: &[&str] = &[
    "comparator",
    "subject",
    "from",
    "handle",
    "mailbox",
    "tzid",
    "header",
    "uniqueid",
    "priority",
    "importance",
    "message",
    "method",
];
const TAGS_WITH_STRINGLIST_VALUE: &[&str] = &["flags", "addresses", "options", "times"];
const TAGS_WITH_NUMBER_VALUE: &[&str] = &["over", "under", "seconds", "days"];

fn tag_value_kind(name: &str) -> Option<u8> {
    if TAGS_WITH_STRING_VALUE.contains(&name) {
        Some(0)
    } else if TAGS_WITH_STRINGLIST_VALUE.contains(&name) {
        Some(1)
    } else if TAGS_WITH_NUMBER_VALUE.contains(&name) {
        Some(2)
    } else {
        None
    }
}

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    extensions_active: ExtensionSet,
    support: ExtensionSet,
    issues: Vec<ParseIssue>,
    fatal: bool,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], extensions_active: ExtensionSet) -> Self {
        Self {
            tokens,
            pos: 0,
            extensions_active,
            support: ExtensionSet::empty(),
            issues: Vec::new(),
            fatal: false,
        }
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn error(&mut self, message: impl Into<String>) {
        self.issues.push(ParseIssue {
            line: self.current_line(),
            message: message.into(),
        });
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|s| s.token.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_semicolon(&mut self) {
        if !self.eat(&Token::Semicolon) {
            self.error("expected ';'");
        }
    }

    /// Skips tokens until the next `;` (consumed) or `}` (not consumed),
    /// so a single malformed command doesn't derail the rest of the
    /// script (§4.1 / §7: best-effort multi-error reporting).
    fn recover(&mut self) {
        loop {
            match self.peek() {
                None => break,
                Some(Token::Semicolon) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::RBrace) => break,
                _ => {
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_string_list_literal(&mut self) -> Vec<String> {
        self.pos += 1; // consume '['
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Token::String(s)) => {
                    items.push(s.clone());
                    self.pos += 1;
                    if self.eat(&Token::Comma) {
                        continue;
                    }
                }
                _ => {}
            }
            if self.eat(&Token::RBracket) {
                break;
            }
            if self.peek().is_none() {
                self.error("unterminated string list");
                break;
            }
            if !matches!(self.peek(), Some(Token::Comma) | Some(Token::String(_))) {
                self.error("expected ']' or ',' in string list");
                break;
            }
        }
        items
    }

    fn parse_arg_value(&mut self) -> ArgValue {
        match self.peek().cloned() {
            Some(Token::String(s)) => {
                self.pos += 1;
                ArgValue::Str(s)
            }
            Some(Token::Number(n)) => {
                self.pos += 1;
                ArgValue::Num(n)
            }
            Some(Token::LBracket) => ArgValue::StrList(self.parse_string_list_literal()),
            _ => {
                self.error("expected a value");
                ArgValue::Str(String::new())
            }
        }
    }

    fn parse_args(&mut self) -> Args {
        let mut args = Args::default();
        loop {
            match self.peek().cloned() {
                Some(Token::Tag(name)) => {
                    self.pos += 1;
                    let value = tag_value_kind(&name).map(|_| self.parse_arg_value());
                    args.tags.insert(name, value);
                }
                Some(Token::String(_)) | Some(Token::Number(_)) | Some(Token::LBracket) => {
                    let v = self.parse_arg_value();
                    args.positionals.push(v);
                }
                _ => break,
            }
        }
        args
    }

    fn require_extension(&mut self, ext: Extension) {
        self.support.insert(ext);
        if !self.extensions_active.contains(ext) {
            self.fatal = true;
            self.error(format!("Unsupported feature {}", ext.name()));
        }
    }

    fn parse_block(&mut self) -> Block {
        let mut commands = Vec::new();
        while self.peek().is_some() && self.peek() != Some(&Token::RBrace) && !self.fatal {
            if let Some(cmd) = self.parse_command() {
                commands.push(cmd);
            }
        }
        commands
    }

    fn parse_braced_block(&mut self) -> Block {
        if !self.eat(&Token::LBrace) {
            self.error("expected '{'");
            return Vec::new();
        }
        let block = self.parse_block();
        if !self.eat(&Token::RBrace) {
            self.error("expected '}'");
        }
        block
    }

    fn parse_command(&mut self) -> Option<Command> {
        let name = match self.peek().cloned() {
            Some(Token::Identifier(name)) => {
                self.pos += 1;
                name
            }
            Some(_) => {
                self.error("expected a command");
                self.recover();
                return None;
            }
            None => return None,
        };

        let command = match name.as_str() {
            "if" => return Some(self.parse_if()),
            "require" => {
                let args = self.parse_args();
                self.expect_semicolon();
                let names = if args.positionals.len() == 1 {
                    args.positionals[0].clone().into_string_list()
                } else {
                    args.positionals
                        .iter()
                        .cloned()
                        .map(ArgValue::into_string)
                        .collect()
                };
                for name in &names {
                    match Extension::from_name(name) {
                        Some(ext) => self.require_extension(ext),
                        None => {
                            self.fatal = true;
                            self.error(format!("Unsupported feature {name}"));
                        }
                    }
                }
                return Some(Command::Require(names));
            }
            "stop" => Command::Stop,
            "discard" => Command::Discard,
            "mark" => Command::Mark,
            "unmark" => Command::Unmark,
            "keep" => {
                let mut args = self.parse_args();
                Command::Keep {
                    flags: args.take_tag_list("flags").unwrap_or_default(),
                }
            }
            "fileinto" => {
                let mut args = self.parse_args();
                self.require_extension(Extension::Fileinto);
                let create = args.has_flag("create");
                let copy = args.has_flag("copy");
                let flags = args.take_tag_list("flags").unwrap_or_default();
                let mailbox = args.positional_string(0);
                Command::FileInto {
                    mailbox,
                    flags,
                    copy,
                    create,
                }
            }
            "redirect" => {
                let mut args = self.parse_args();
                self.require_extension(Extension::Redirect);
                let copy = args.has_flag("copy");
                let list_id = args.take_tag_string("list");
                let address = args.positional_string(0);
                Command::Redirect {
                    address,
                    copy,
                    list_id,
                }
            }
            "reject" | "ereject" => {
                let ext = if name == "ereject" {
                    Extension::Ereject
                } else {
                    Extension::Reject
                };
                let mut args = self.parse_args();
                self.require_extension(ext);
                let reason = args.positional_string(0);
                Command::Reject {
                    reason,
                    extended: name == "ereject",
                }
            }
            "setflag" | "addflag" | "removeflag" => {
                self.require_extension(Extension::Imap4Flags);
                let mut args = self.parse_args();
                let flag_args = FlagArgs {
                    variable: args.positionals.first().cloned().and_then(|v| {
                        if args.positionals.len() > 1 {
                            Some(v.into_string())
                        } else {
                            None
                        }
                    }),
                    flags: args
                        .positionals
                        .last()
                        .cloned()
                        .map(ArgValue::into_string_list)
                        .unwrap_or_default(),
                };
                match name.as_str() {
                    "setflag" => Command::SetFlag(flag_args),
                    "addflag" => Command::AddFlag(flag_args),
                    _ => Command::RemoveFlag(flag_args),
                }
            }
            "vacation" => {
                self.require_extension(Extension::Vacation);
                let mut args = self.parse_args();
                Command::Vacation(VacationArgs {
                    reason: args.positional_string(0),
                    subject: args.take_tag_string("subject"),
                    from: args.take_tag_string("from"),
                    handle: args.take_tag_string("handle"),
                    days: args.take_tag_num("days").map(|d| d as u32),
                    addresses: args.take_tag_list("addresses").unwrap_or_default(),
                    mime: args.has_flag("mime"),
                })
            }
            "notify" => {
                self.require_extension(Extension::Notify);
                let mut args = self.parse_args();
                let priority = args
                    .take_tag_string("priority")
                    .or_else(|| args.take_tag_string("importance"));
                Command::Notify(NotifyArgs {
                    method: args
                        .take_tag_string("method")
                        .unwrap_or_else(|| args.positional_string(0)),
                    from: args.take_tag_string("from"),
                    options: args.take_tag_list("options").unwrap_or_default(),
                    priority,
                    message: args.take_tag_string("message"),
                })
            }
            "denotify" => {
                self.require_extension(Extension::Notify);
                let mut args = self.parse_args();
                let priority = args
                    .take_tag_string("priority")
                    .or_else(|| args.take_tag_string("importance"));
                Command::Denotify(DenotifyArgs {
                    method: args.take_tag_string("method"),
                    priority,
                })
            }
            "snooze" => {
                self.require_extension(Extension::Snooze);
                let mut args = self.parse_args();
                Command::Snooze(SnoozeArgs {
                    mailbox: args.take_tag_string("mailbox"),
                    flags: args.take_tag_list("flags").unwrap_or_default(),
                    addflags: args.has_flag("addflags"),
                    tzid: args.take_tag_string("tzid"),
                    times: args.take_tag_list("times").unwrap_or_default(),
                    days: args.take_tag_num("days").map(|d| d as u8),
                })
            }
            "set" => {
                self.require_extension(Extension::Variables);
                let mut args = self.parse_args();
                Command::Set {
                    variable: args.positional_string(0),
                    value: args.positional_string(1),
                }
            }
            "include" => {
                let mut args = self.parse_args();
                let once = args.has_flag("once");
                Command::Include {
                    path: args.positional_string(0),
                    once,
                }
            }
            other => {
                self.error(format!("unknown command '{other}'"));
                self.recover();
                return None;
            }
        };

        self.expect_semicolon();
        Some(command)
    }

    fn parse_if(&mut self) -> Command {
        let mut branches = Vec::new();
        let test = self.parse_test();
        let block = self.parse_braced_block();
        branches.push((test, block));

        loop {
            match self.peek() {
                Some(Token::Identifier(kw)) if kw == "elsif" => {
                    self.pos += 1;
                    let test = self.parse_test();
                    let block = self.parse_braced_block();
                    branches.push((test, block));
                }
                _ => break,
            }
        }

        let otherwise = match self.peek() {
            Some(Token::Identifier(kw)) if kw == "else" => {
                self.pos += 1;
                Some(self.parse_braced_block())
            }
            _ => None,
        };

        Command::If { branches, otherwise }
    }

    fn parse_test_list(&mut self) -> Vec<Test> {
        if !self.eat(&Token::LParen) {
            self.error("expected '('");
            return Vec::new();
        }
        let mut tests = Vec::new();
        loop {
            if self.peek() == Some(&Token::RParen) || self.peek().is_none() {
                break;
            }
            tests.push(self.parse_test());
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if !self.eat(&Token::RParen) {
            self.error("expected ')'");
        }
        tests
    }

    fn parse_test(&mut self) -> Test {
        let name = match self.peek().cloned() {
            Some(Token::Identifier(name)) => {
                self.pos += 1;
                name
            }
            _ => {
                self.error("expected a test");
                return Test::False;
            }
        };

        match name.as_str() {
            "true" => Test::True,
            "false" => Test::False,
            "not" => Test::Not(Box::new(self.parse_test())),
            "anyof" => Test::AnyOf(self.parse_test_list()),
            "allof" => Test::AllOf(self.parse_test_list()),
            "exists" => {
                let mut args = self.parse_args();
                Test::Exists(args.positional_list(0))
            }
            "size" => {
                let mut args = self.parse_args();
                let over_value = args.take_tag_num("over");
                let under_value = args.take_tag_num("under");
                let over = over_value.is_some();
                let limit = over_value.or(under_value).unwrap_or(0);
                Test::Size { over, limit }
            }
            "duplicate" => {
                self.require_extension(Extension::Duplicate);
                let mut args = self.parse_args();
                Test::Duplicate {
                    handle: args.take_tag_string("handle"),
                    seconds: args.take_tag_num("seconds"),
                    header: args.take_tag_string("header"),
                    unique_id: args.take_tag_string("uniqueid"),
                }
            }
            "header" => {
                let mut args = self.parse_args();
                let match_type = args.match_type();
                let names = args.positional_list(0);
                let keys = args.positional_list(1);
                Test::Header {
                    names,
                    match_type,
                    keys,
                }
            }
            "address" => {
                self.require_extension(Extension::Envelope);
                let mut args = self.parse_args();
                let part = args.address_part();
                let match_type = args.match_type();
                let names = args.positional_list(0);
                let keys = args.positional_list(1);
                Test::Address {
                    part,
                    names,
                    match_type,
                    keys,
                }
            }
            "envelope" => {
                self.require_extension(Extension::Envelope);
                let mut args = self.parse_args();
                let part = args.address_part();
                let match_type = args.match_type();
                let names = args.positional_list(0);
                let keys = args.positional_list(1);
                Test::Envelope {
                    part,
                    names,
                    match_type,
                    keys,
                }
            }
            other => {
                self.error(format!("unknown test '{other}'"));
                Test::False
            }
        }
    }
}

/// Parses a token stream into a command tree, checking every `require`
/// against `extensions_active` as it goes.
pub fn parse_tokens(tokens: &[Spanned], extensions_active: ExtensionSet) -> ParseOutcome {
    let mut parser = Parser::new(tokens, extensions_active);
    let block = parser.parse_block();
    ParseOutcome {
        block,
        support: parser.support,
        issues: parser.issues,
        fatal: parser.fatal,
    }
}

//! Binary encoding for the compiled form of a command tree.
//!
//! Mirrors the teacher codec's `Encode`/`Decode` trait shape exactly
//! (`imap_codec::codec::{Encode, Decode}`): `encode` writes to any
//! `io::Write`, `decode` takes a byte slice and returns the remaining
//! input alongside the decoded value. The wire format itself is private
//! and versioned (§6: "this spec treats it as an opaque memory-mappable
//! blob... cross-version compatibility is not required"), so it is
//! intentionally simple: a tag byte per enum variant, `u32`-length-
//! prefixed strings, `u32`-count-prefixed vectors.

use std::io::{self, Write};

use crate::ast::{
    AddressPart, Block, Command, DenotifyArgs, FlagArgs, MatchType, NotifyArgs, SnoozeArgs, Test,
    VacationArgs,
};

/// Bumped whenever the wire format changes; `decode_program` refuses to
/// read a blob stamped with a different version.
pub const BYTECODE_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Incomplete,
    Failed(&'static str),
}

pub trait Encode {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()>;
}

pub trait Decode<'a>: Sized {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError>;
}

fn take<'a>(input: &'a [u8], n: usize) -> Result<(&'a [u8], &'a [u8]), DecodeError> {
    if input.len() < n {
        return Err(DecodeError::Incomplete);
    }
    Ok((&input[n..], &input[..n]))
}

impl Encode for u8 {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&[*self])
    }
}

impl<'a> Decode<'a> for u8 {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, bytes) = take(input, 1)?;
        Ok((rest, bytes[0]))
    }
}

impl Encode for bool {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        (*self as u8).encode(w)
    }
}

impl<'a> Decode<'a> for bool {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, byte) = u8::decode(input)?;
        Ok((rest, byte != 0))
    }
}

impl Encode for u32 {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.to_le_bytes())
    }
}

impl<'a> Decode<'a> for u32 {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, bytes) = take(input, 4)?;
        Ok((rest, u32::from_le_bytes(bytes.try_into().unwrap())))
    }
}

impl Encode for u64 {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        w.write_all(&self.to_le_bytes())
    }
}

impl<'a> Decode<'a> for u64 {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, bytes) = take(input, 8)?;
        Ok((rest, u64::from_le_bytes(bytes.try_into().unwrap())))
    }
}

impl Encode for String {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        (self.len() as u32).encode(w)?;
        w.write_all(self.as_bytes())
    }
}

impl<'a> Decode<'a> for String {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, len) = u32::decode(input)?;
        let (rest, bytes) = take(rest, len as usize)?;
        let s = std::str::from_utf8(bytes)
            .map_err(|_| DecodeError::Failed("invalid utf-8 in string"))?;
        Ok((rest, s.to_string()))
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        (self.len() as u32).encode(w)?;
        for item in self {
            item.encode(w)?;
        }
        Ok(())
    }
}

impl<'a, T: Decode<'a>> Decode<'a> for Vec<T> {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (mut rest, len) = u32::decode(input)?;
        let mut items = Vec::with_capacity(len as usize);
        for _ in 0..len {
            let (next_rest, item) = T::decode(rest)?;
            items.push(item);
            rest = next_rest;
        }
        Ok((rest, items))
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            Some(v) => {
                true.encode(w)?;
                v.encode(w)
            }
            None => false.encode(w),
        }
    }
}

impl<'a, T: Decode<'a>> Decode<'a> for Option<T> {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, present) = bool::decode(input)?;
        if present {
            let (rest, v) = T::decode(rest)?;
            Ok((rest, Some(v)))
        } else {
            Ok((rest, None))
        }
    }
}

impl<T: Encode, U: Encode> Encode for (T, U) {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        self.0.encode(w)?;
        self.1.encode(w)
    }
}

impl<'a, T: Decode<'a>, U: Decode<'a>> Decode<'a> for (T, U) {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, a) = T::decode(input)?;
        let (rest, b) = U::decode(rest)?;
        Ok((rest, (a, b)))
    }
}

impl Encode for MatchType {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        let tag: u8 = match self {
            Self::Is => 0,
            Self::Contains => 1,
            Self::Matches => 2,
        };
        tag.encode(w)
    }
}

impl<'a> Decode<'a> for MatchType {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, tag) = u8::decode(input)?;
        let v = match tag {
            0 => Self::Is,
            1 => Self::Contains,
            2 => Self::Matches,
            _ => return Err(DecodeError::Failed("bad MatchType tag")),
        };
        Ok((rest, v))
    }
}

impl Encode for AddressPart {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        let tag: u8 = match self {
            Self::All => 0,
            Self::LocalPart => 1,
            Self::Domain => 2,
        };
        tag.encode(w)
    }
}

impl<'a> Decode<'a> for AddressPart {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, tag) = u8::decode(input)?;
        let v = match tag {
            0 => Self::All,
            1 => Self::LocalPart,
            2 => Self::Domain,
            _ => return Err(DecodeError::Failed("bad AddressPart tag")),
        };
        Ok((rest, v))
    }
}

impl Encode for Test {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            Self::True => 0u8.encode(w),
            Self::False => 1u8.encode(w),
            Self::Not(inner) => {
                2u8.encode(w)?;
                inner.encode(w)
            }
            Self::AnyOf(tests) => {
                3u8.encode(w)?;
                tests.encode(w)
            }
            Self::AllOf(tests) => {
                4u8.encode(w)?;
                tests.encode(w)
            }
            Self::Header {
                names,
                match_type,
                keys,
            } => {
                5u8.encode(w)?;
                names.encode(w)?;
                match_type.encode(w)?;
                keys.encode(w)
            }
            Self::Address {
                part,
                names,
                match_type,
                keys,
            } => {
                6u8.encode(w)?;
                part.encode(w)?;
                names.encode(w)?;
                match_type.encode(w)?;
                keys.encode(w)
            }
            Self::Envelope {
                part,
                names,
                match_type,
                keys,
            } => {
                7u8.encode(w)?;
                part.encode(w)?;
                names.encode(w)?;
                match_type.encode(w)?;
                keys.encode(w)
            }
            Self::Exists(names) => {
                8u8.encode(w)?;
                names.encode(w)
            }
            Self::Size { over, limit } => {
                9u8.encode(w)?;
                over.encode(w)?;
                limit.encode(w)
            }
            Self::Duplicate {
                handle,
                seconds,
                header,
                unique_id,
            } => {
                10u8.encode(w)?;
                handle.encode(w)?;
                seconds.encode(w)?;
                header.encode(w)?;
                unique_id.encode(w)
            }
        }
    }
}

impl<'a> Decode<'a> for Test {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, tag) = u8::decode(input)?;
        match tag {
            0 => Ok((rest, Self::True)),
            1 => Ok((rest, Self::False)),
            2 => {
                let (rest, inner) = Test::decode(rest)?;
                Ok((rest, Self::Not(Box::new(inner))))
            }
            3 => {
                let (rest, tests) = Vec::<Test>::decode(rest)?;
                Ok((rest, Self::AnyOf(tests)))
            }
            4 => {
                let (rest, tests) = Vec::<Test>::decode(rest)?;
                Ok((rest, Self::AllOf(tests)))
            }
            5 => {
                let (rest, names) = Vec::<String>::decode(rest)?;
                let (rest, match_type) = MatchType::decode(rest)?;
                let (rest, keys) = Vec::<String>::decode(rest)?;
                Ok((
                    rest,
                    Self::Header {
                        names,
                        match_type,
                        keys,
                    },
                ))
            }
            6 => {
                let (rest, part) = AddressPart::decode(rest)?;
                let (rest, names) = Vec::<String>::decode(rest)?;
                let (rest, match_type) = MatchType::decode(rest)?;
                let (rest, keys) = Vec::<String>::decode(rest)?;
                Ok((
                    rest,
                    Self::Address {
                        part,
                        names,
                        match_type,
                        keys,
                    },
                ))
            }
            7 => {
                let (rest, part) = AddressPart::decode(rest)?;
                let (rest, names) = Vec::<String>::decode(rest)?;
                let (rest, match_type) = MatchType::decode(rest)?;
                let (rest, keys) = Vec::<String>::decode(rest)?;
                Ok((
                    rest,
                    Self::Envelope {
                        part,
                        names,
                        match_type,
                        keys,
                    },
                ))
            }
            8 => {
                let (rest, names) = Vec::<String>::decode(rest)?;
                Ok((rest, Self::Exists(names)))
            }
            9 => {
                let (rest, over) = bool::decode(rest)?;
                let (rest, limit) = u64::decode(rest)?;
                Ok((rest, Self::Size { over, limit }))
            }
            10 => {
                let (rest, handle) = Option::<String>::decode(rest)?;
                let (rest, seconds) = Option::<u64>::decode(rest)?;
                let (rest, header) = Option::<String>::decode(rest)?;
                let (rest, unique_id) = Option::<String>::decode(rest)?;
                Ok((
                    rest,
                    Self::Duplicate {
                        handle,
                        seconds,
                        header,
                        unique_id,
                    },
                ))
            }
            _ => Err(DecodeError::Failed("bad Test tag")),
        }
    }
}

impl Encode for FlagArgs {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        self.variable.encode(w)?;
        self.flags.encode(w)
    }
}

impl<'a> Decode<'a> for FlagArgs {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, variable) = Option::<String>::decode(input)?;
        let (rest, flags) = Vec::<String>::decode(rest)?;
        Ok((rest, Self { variable, flags }))
    }
}

impl Encode for VacationArgs {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        self.reason.encode(w)?;
        self.subject.encode(w)?;
        self.from.encode(w)?;
        self.handle.encode(w)?;
        self.days.encode(w)?;
        self.addresses.encode(w)?;
        self.mime.encode(w)
    }
}

impl<'a> Decode<'a> for VacationArgs {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, reason) = String::decode(input)?;
        let (rest, subject) = Option::<String>::decode(rest)?;
        let (rest, from) = Option::<String>::decode(rest)?;
        let (rest, handle) = Option::<String>::decode(rest)?;
        let (rest, days) = Option::<u32>::decode(rest)?;
        let (rest, addresses) = Vec::<String>::decode(rest)?;
        let (rest, mime) = bool::decode(rest)?;
        Ok((
            rest,
            Self {
                reason,
                subject,
                from,
                handle,
                days,
                addresses,
                mime,
            },
        ))
    }
}

impl Encode for NotifyArgs {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        self.method.encode(w)?;
        self.from.encode(w)?;
        self.options.encode(w)?;
        self.priority.encode(w)?;
        self.message.encode(w)
    }
}

impl<'a> Decode<'a> for NotifyArgs {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, method) = String::decode(input)?;
        let (rest, from) = Option::<String>::decode(rest)?;
        let (rest, options) = Vec::<String>::decode(rest)?;
        let (rest, priority) = Option::<String>::decode(rest)?;
        let (rest, message) = Option::<String>::decode(rest)?;
        Ok((
            rest,
            Self {
                method,
                from,
                options,
                priority,
                message,
            },
        ))
    }
}

impl Encode for DenotifyArgs {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        self.method.encode(w)?;
        self.priority.encode(w)
    }
}

impl<'a> Decode<'a> for DenotifyArgs {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, method) = Option::<String>::decode(input)?;
        let (rest, priority) = Option::<String>::decode(rest)?;
        Ok((rest, Self { method, priority }))
    }
}

impl Encode for SnoozeArgs {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        self.mailbox.encode(w)?;
        self.flags.encode(w)?;
        self.addflags.encode(w)?;
        self.tzid.encode(w)?;
        self.times.encode(w)?;
        self.days.encode(w)
    }
}

impl<'a> Decode<'a> for SnoozeArgs {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, mailbox) = Option::<String>::decode(input)?;
        let (rest, flags) = Vec::<String>::decode(rest)?;
        let (rest, addflags) = bool::decode(rest)?;
        let (rest, tzid) = Option::<String>::decode(rest)?;
        let (rest, times) = Vec::<String>::decode(rest)?;
        let (rest, days) = Option::<u8>::decode(rest)?;
        Ok((
            rest,
            Self {
                mailbox,
                flags,
                addflags,
                tzid,
                times,
                days,
            },
        ))
    }
}

impl Encode for Command {
    fn encode(&self, w: &mut dyn Write) -> io::Result<()> {
        match self {
            Self::If { branches, otherwise } => {
                0u8.encode(w)?;
                branches.encode(w)?;
                otherwise.encode(w)
            }
            Self::Require(names) => {
                1u8.encode(w)?;
                names.encode(w)
            }
            Self::Stop => 2u8.encode(w),
            Self::Keep { flags } => {
                3u8.encode(w)?;
                flags.encode(w)
            }
            Self::Discard => 4u8.encode(w),
            Self::FileInto {
                mailbox,
                flags,
                copy,
                create,
            } => {
                5u8.encode(w)?;
                mailbox.encode(w)?;
                flags.encode(w)?;
                copy.encode(w)?;
                create.encode(w)
            }
            Self::Redirect {
                address,
                copy,
                list_id,
            } => {
                6u8.encode(w)?;
                address.encode(w)?;
                copy.encode(w)?;
                list_id.encode(w)
            }
            Self::Reject { reason, extended } => {
                7u8.encode(w)?;
                reason.encode(w)?;
                extended.encode(w)
            }
            Self::SetFlag(args) => {
                8u8.encode(w)?;
                args.encode(w)
            }
            Self::AddFlag(args) => {
                9u8.encode(w)?;
                args.encode(w)
            }
            Self::RemoveFlag(args) => {
                10u8.encode(w)?;
                args.encode(w)
            }
            Self::Mark => 11u8.encode(w),
            Self::Unmark => 12u8.encode(w),
            Self::Vacation(args) => {
                13u8.encode(w)?;
                args.encode(w)
            }
            Self::Notify(args) => {
                14u8.encode(w)?;
                args.encode(w)
            }
            Self::Denotify(args) => {
                15u8.encode(w)?;
                args.encode(w)
            }
            Self::Snooze(args) => {
                16u8.encode(w)?;
                args.encode(w)
            }
            Self::Set { variable, value } => {
                17u8.encode(w)?;
                variable.encode(w)?;
                value.encode(w)
            }
            Self::Include { path, once } => {
                18u8.encode(w)?;
                path.encode(w)?;
                once.encode(w)
            }
        }
    }
}

impl<'a> Decode<'a> for Command {
    fn decode(input: &'a [u8]) -> Result<(&'a [u8], Self), DecodeError> {
        let (rest, tag) = u8::decode(input)?;
        match tag {
            0 => {
                let (rest, branches) = Vec::<(Test, Block)>::decode(rest)?;
                let (rest, otherwise) = Option::<Block>::decode(rest)?;
                Ok((rest, Self::If { branches, otherwise }))
            }
            1 => {
                let (rest, names) = Vec::<String>::decode(rest)?;
                Ok((rest, Self::Require(names)))
            }
            2 => Ok((rest, Self::Stop)),
            3 => {
                let (rest, flags) = Vec::<String>::decode(rest)?;
                Ok((rest, Self::Keep { flags }))
            }
            4 => Ok((rest, Self::Discard)),
            5 => {
                let (rest, mailbox) = String::decode(rest)?;
                let (rest, flags) = Vec::<String>::decode(rest)?;
                let (rest, copy) = bool::decode(rest)?;
                let (rest, create) = bool::decode(rest)?;
                Ok((
                    rest,
                    Self::FileInto {
                        mailbox,
                        flags,
                        copy,
                        create,
                    },
                ))
            }
            6 => {
                let (rest, address) = String::decode(rest)?;
                let (rest, copy) = bool::decode(rest)?;
                let (rest, list_id) = Option::<String>::decode(rest)?;
                Ok((
                    rest,
                    Self::Redirect {
                        address,
                        copy,
                        list_id,
                    },
                ))
            }
            7 => {
                let (rest, reason) = String::decode(rest)?;
                let (rest, extended) = bool::decode(rest)?;
                Ok((rest, Self::Reject { reason, extended }))
            }
            8 => {
                let (rest, args) = FlagArgs::decode(rest)?;
                Ok((rest, Self::SetFlag(args)))
            }
            9 => {
                let (rest, args) = FlagArgs::decode(rest)?;
                Ok((rest, Self::AddFlag(args)))
            }
            10 => {
                let (rest, args) = FlagArgs::decode(rest)?;
                Ok((rest, Self::RemoveFlag(args)))
            }
            11 => Ok((rest, Self::Mark)),
            12 => Ok((rest, Self::Unmark)),
            13 => {
                let (rest, args) = VacationArgs::decode(rest)?;
                Ok((rest, Self::Vacation(args)))
            }
            14 => {
                let (rest, args) = NotifyArgs::decode(rest)?;
                Ok((rest, Self::Notify(args)))
            }
            15 => {
                let (rest, args) = DenotifyArgs::decode(rest)?;
                Ok((rest, Self::Denotify(args)))
            }
            16 => {
                let (rest, args) = SnoozeArgs::decode(rest)?;
                Ok((rest, Self::Snooze(args)))
            }
            17 => {
                let (rest, variable) = String::decode(rest)?;
                let (rest, value) = String::decode(rest)?;
                Ok((rest, Self::Set { variable, value }))
            }
            18 => {
                let (rest, path) = String::decode(rest)?;
                let (rest, once) = bool::decode(rest)?;
                Ok((rest, Self::Include { path, once }))
            }
            _ => Err(DecodeError::Failed("bad Command tag")),
        }
    }
}

/// Encodes a whole compiled command tree into a standalone byte blob,
/// prefixed with [`BYTECODE_VERSION`].
pub fn encode_program(block: &Block) -> Vec<u8> {
    let mut out = Vec::new();
    BYTECODE_VERSION.encode(&mut out).expect("writing to Vec<u8> cannot fail");
    block.encode(&mut out).expect("writing to Vec<u8> cannot fail");
    out
}

/// Inverse of [`encode_program`]. Rejects a blob stamped with a
/// different version outright rather than attempting to read it.
pub fn decode_program(bytes: &[u8]) -> Result<Block, DecodeError> {
    let (rest, version) = u8::decode(bytes)?;
    if version != BYTECODE_VERSION {
        return Err(DecodeError::Failed("unsupported bytecode version"));
    }
    let (_, block) = Block::decode(rest)?;
    Ok(block)
}

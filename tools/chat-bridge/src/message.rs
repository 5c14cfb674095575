// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The chat sample type and the bus coordinates it travels on.

use std::sync::OnceLock;

use chatbus::{CdrReader, CdrWriter, FieldKind, MemberDescriptor, TypeDescriptor, DDS};

/// Domain the bridge joins unless told otherwise.
pub const CHAT_DOMAIN_ID: u32 = 10;

/// Topic carrying chat messages.
pub const USER_MESSAGES_TOPIC: &str = "User Messages";

/// Fully qualified type name of [`UserMessage`].
pub const USER_MESSAGE_TYPE: &str = "Chat::UserMessage";

/// One chat message, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    message: String,
}

impl UserMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_message(self) -> String {
        self.message
    }
}

impl DDS for UserMessage {
    fn type_descriptor() -> &'static TypeDescriptor {
        static DESC: OnceLock<TypeDescriptor> = OnceLock::new();
        DESC.get_or_init(|| {
            TypeDescriptor::new(
                USER_MESSAGE_TYPE,
                vec![MemberDescriptor::new(
                    "message",
                    FieldKind::String { bound: None },
                )],
            )
        })
    }

    fn encode_cdr2(&self, writer: &mut CdrWriter) -> chatbus::Result<()> {
        writer.write_string(&self.message)
    }

    fn decode_cdr2(buf: &[u8]) -> chatbus::Result<Self> {
        let mut reader = CdrReader::new(buf);
        Ok(Self {
            message: reader.read_string()?,
        })
    }
}

//! turning message events into chat log candidates.
//!
//! these rules are storage-free; the application looks the resulting phone
//! number up in its contacts and records the chat.

use chrono::{DateTime, Utc};

use crate::event::{Message, MessageEvent, MessageInfo};
use crate::jid::Jid;

/// prefix for text taken from an image caption.
pub const IMAGE_PREFIX: &str = "<image> ";

/// a message worth recording against a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCandidate {
    /// the other party, without device part
    pub other_party: Jid,
    /// `other_party.user`; a phone number when the jid is phone-addressed
    pub phone: String,
    pub text: String,
    /// sent by us
    pub outgoing: bool,
    pub sent_at: DateTime<Utc>,
}

/// message text: conversation, then extended text, then image caption.
/// blank text yields `None`.
pub fn extract_text(message: &Message) -> Option<String> {
    let text = if let Some(c) = message.conversation.as_deref().filter(|c| !c.is_empty()) {
        c.to_string()
    } else if let Some(t) = message
        .extended_text
        .as_ref()
        .and_then(|e| e.text.as_deref())
        .filter(|t| !t.is_empty())
    {
        t.to_string()
    } else if let Some(caption) = message.image.as_ref().and_then(|i| i.caption.as_deref()) {
        format!("{}{}", IMAGE_PREFIX, caption)
    } else {
        return None;
    };

    let text = text.trim();
    if text.is_empty() || text == IMAGE_PREFIX.trim() {
        return None;
    }
    Some(text.to_string())
}

fn destination_jid(info: &MessageInfo) -> Option<Jid> {
    let meta = info.device_sent_meta.as_ref()?;
    if meta.destination_jid.is_empty() {
        return None;
    }
    Jid::parse(&meta.destination_jid).ok()
}

/// true for messages we sent, from this or another of our devices.
pub fn is_outgoing(info: &MessageInfo) -> bool {
    info.is_from_me
        || info
            .device_sent_meta
            .as_ref()
            .is_some_and(|m| !m.destination_jid.is_empty())
}

/// the jid of the person on the other end of a message.
///
/// phone-number addresses win over hidden (lid) ones whenever any field
/// carries one. the device part is always dropped.
pub fn resolve_other_party_jid(info: &MessageInfo) -> Jid {
    let chosen = if is_outgoing(info) {
        if let Some(dest) = destination_jid(info).filter(Jid::is_phone_number) {
            return dest.to_non_ad();
        }
        pick(&info.chat, &[&info.chat, &info.recipient_alt])
    } else {
        let primary = [&info.sender, &info.sender_alt, &info.chat]
            .into_iter()
            .find(|j| !j.is_empty())
            .unwrap_or(&info.chat);
        pick(primary, &[&info.sender, &info.sender_alt, &info.chat])
    };
    chosen.to_non_ad()
}

/// `primary` unless it isn't phone-addressed and a candidate is.
fn pick<'a>(primary: &'a Jid, candidates: &[&'a Jid]) -> &'a Jid {
    if primary.is_phone_number() {
        return primary;
    }
    candidates
        .iter()
        .copied()
        .find(|j| j.is_phone_number())
        .unwrap_or(primary)
}

/// apply the drop rules and resolve addressing.
///
/// group messages and messages without text are dropped.
pub fn chat_candidate(event: &MessageEvent) -> Option<ChatCandidate> {
    let info = &event.info;
    if info.is_group || info.chat.is_group() {
        return None;
    }
    let text = extract_text(&event.message)?;
    let other_party = resolve_other_party_jid(info);
    if other_party.user.is_empty() {
        return None;
    }
    Some(ChatCandidate {
        phone: other_party.user.clone(),
        other_party,
        text,
        outgoing: is_outgoing(info),
        sent_at: info.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DeviceSentMeta, ExtendedTextMessage, ImageMessage};

    fn jid(s: &str) -> Jid {
        Jid::parse(s).unwrap()
    }

    fn meta(dest: &str) -> Option<DeviceSentMeta> {
        Some(DeviceSentMeta {
            destination_jid: dest.to_string(),
        })
    }

    #[test]
    fn test_outgoing_lid_destination_falls_back_to_chat() {
        let info = MessageInfo {
            is_from_me: true,
            chat: jid("11111111111@s.whatsapp.net"),
            device_sent_meta: meta("88888888888@lid"),
            ..Default::default()
        };
        assert_eq!(
            resolve_other_party_jid(&info).to_string(),
            "11111111111@s.whatsapp.net"
        );
    }

    #[test]
    fn test_outgoing_phone_destination_wins() {
        let info = MessageInfo {
            is_from_me: true,
            chat: jid("8@lid"),
            device_sent_meta: meta("12223334444:5@s.whatsapp.net"),
            ..Default::default()
        };
        assert_eq!(resolve_other_party_jid(&info).to_string(), "12223334444@s.whatsapp.net");
    }

    #[test]
    fn test_outgoing_prefers_phone_recipient_alt() {
        let info = MessageInfo {
            is_from_me: true,
            chat: jid("8@lid"),
            recipient_alt: jid("12223334444@c.us"),
            ..Default::default()
        };
        assert_eq!(resolve_other_party_jid(&info).to_string(), "12223334444@c.us");

        let hidden = MessageInfo {
            is_from_me: true,
            chat: jid("8@lid"),
            recipient_alt: jid("9@hosted.lid"),
            ..Default::default()
        };
        assert_eq!(resolve_other_party_jid(&hidden).to_string(), "8@lid");
    }

    #[test]
    fn test_incoming_resolution() {
        let info = MessageInfo {
            sender: jid("8:3@lid"),
            sender_alt: jid("15550001111:3@s.whatsapp.net"),
            chat: jid("8@lid"),
            ..Default::default()
        };
        assert_eq!(resolve_other_party_jid(&info).to_string(), "15550001111@s.whatsapp.net");

        let info = MessageInfo {
            sender: jid("15550001111:7@s.whatsapp.net"),
            chat: jid("15550001111@s.whatsapp.net"),
            ..Default::default()
        };
        assert_eq!(resolve_other_party_jid(&info).to_string(), "15550001111@s.whatsapp.net");

        let info = MessageInfo {
            chat: jid("8@lid"),
            ..Default::default()
        };
        assert_eq!(resolve_other_party_jid(&info).to_string(), "8@lid");
    }

    #[test]
    fn test_resolution_prefers_phone_whenever_present() {
        let options = ["", "1@s.whatsapp.net", "2:4@c.us", "8@lid", "9:1@hosted.lid"];
        let dests = ["", "3@s.whatsapp.net", "7@lid", "garbage@@"];
        for from_me in [false, true] {
            for chat in options {
                for sender in options {
                    for alt in options {
                        for dest in dests {
                            let j = |s: &str| Jid::parse(s).unwrap_or_default();
                            let info = MessageInfo {
                                is_from_me: from_me,
                                chat: j(chat),
                                sender: j(sender),
                                sender_alt: j(alt),
                                recipient_alt: j(alt),
                                device_sent_meta: meta(dest),
                                ..Default::default()
                            };
                            let fields: Vec<Jid> = if is_outgoing(&info) {
                                vec![j(dest), info.chat.clone(), info.recipient_alt.clone()]
                            } else {
                                vec![info.sender.clone(), info.sender_alt.clone(), info.chat.clone()]
                            };
                            let resolved = resolve_other_party_jid(&info);
                            if fields.iter().any(Jid::is_phone_number) {
                                assert!(resolved.is_phone_number(), "{:?} -> {}", info, resolved);
                            }
                            assert_eq!(resolved.device, 0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_direction() {
        assert!(is_outgoing(&MessageInfo {
            is_from_me: true,
            ..Default::default()
        }));
        assert!(is_outgoing(&MessageInfo {
            device_sent_meta: meta("1@s.whatsapp.net"),
            ..Default::default()
        }));
        assert!(!is_outgoing(&MessageInfo {
            device_sent_meta: meta(""),
            ..Default::default()
        }));
        assert!(!is_outgoing(&MessageInfo::default()));
    }

    #[test]
    fn test_text_precedence() {
        let msg = Message {
            conversation: Some("  plain  ".to_string()),
            extended_text: Some(ExtendedTextMessage {
                text: Some("ext".to_string()),
            }),
            image: Some(ImageMessage {
                caption: Some("cap".to_string()),
            }),
        };
        assert_eq!(extract_text(&msg).as_deref(), Some("plain"));

        let msg = Message {
            conversation: Some(String::new()),
            extended_text: Some(ExtendedTextMessage {
                text: Some("link https://x".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(extract_text(&msg).as_deref(), Some("link https://x"));

        let msg = Message {
            image: Some(ImageMessage {
                caption: Some("sunset".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(extract_text(&msg).as_deref(), Some("<image> sunset"));
    }

    #[test]
    fn test_blank_text_dropped() {
        let msg = Message {
            conversation: Some("   \n".to_string()),
            ..Default::default()
        };
        assert_eq!(extract_text(&msg), None);
        assert_eq!(extract_text(&Message::default()), None);
        let msg = Message {
            image: Some(ImageMessage {
                caption: Some("  ".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(extract_text(&msg), None);
    }

    #[test]
    fn test_group_messages_dropped() {
        let ev = MessageEvent {
            info: MessageInfo {
                chat: jid("123-456@g.us"),
                sender: jid("1@s.whatsapp.net"),
                is_group: true,
                ..Default::default()
            },
            message: Message {
                conversation: Some("hello all".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(chat_candidate(&ev), None);
    }

    #[test]
    fn test_candidate() {
        let ev = MessageEvent {
            info: MessageInfo {
                chat: jid("16505550123@s.whatsapp.net"),
                sender: jid("16505550123:2@s.whatsapp.net"),
                ..Default::default()
            },
            message: Message {
                conversation: Some("hi".to_string()),
                ..Default::default()
            },
        };
        let c = chat_candidate(&ev).unwrap();
        assert_eq!(c.phone, "16505550123");
        assert!(!c.outgoing);
        assert_eq!(c.text, "hi");
    }
}

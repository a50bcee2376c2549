//! contacts, their links and chat history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// unique identifier for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub u64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    #[serde(default)]
    pub emails: Vec<String>,
    /// as entered; compared digit-only
    #[serde(default)]
    pub phones: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub carddav_link: Option<String>,
    /// latest automatically observed contact, e.g. a whatsapp message
    pub last_auto_contact_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Contact {
    pub fn new(id: ContactId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            emails: Vec::new(),
            phones: Vec::new(),
            urls: Vec::new(),
            tags: Vec::new(),
            carddav_link: None,
            last_auto_contact_at: None,
            created_at: Utc::now(),
        }
    }

    /// move `last_auto_contact_at` forward to `at`; never backwards.
    ///
    /// returns whether the value changed.
    pub fn record_auto_contact(&mut self, at: DateTime<Utc>) -> bool {
        match self.last_auto_contact_at {
            Some(existing) if existing >= at => false,
            _ => {
                self.last_auto_contact_at = Some(at);
                true
            }
        }
    }

    /// the contact's urls with their kinds.
    pub fn links(&self) -> Vec<(LinkKind, &str)> {
        self.urls
            .iter()
            .map(|u| (LinkKind::from_url(u), u.as_str()))
            .collect()
    }
}

/// what a contact url points at; decides the icon shown next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    GitHub,
    LinkedIn,
    Mastodon,
    Twitter,
    YouTube,
    Instagram,
    Facebook,
    Qrz,
    Website,
}

impl LinkKind {
    /// classify by host. anything unrecognised is a plain website.
    pub fn from_url(raw: &str) -> Self {
        let Ok(parsed) = url::Url::parse(raw.trim()) else {
            return LinkKind::Website;
        };
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        let on = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

        if on("github.com") {
            LinkKind::GitHub
        } else if on("linkedin.com") {
            LinkKind::LinkedIn
        } else if on("twitter.com") || on("x.com") {
            LinkKind::Twitter
        } else if on("youtube.com") || on("youtu.be") {
            LinkKind::YouTube
        } else if on("instagram.com") {
            LinkKind::Instagram
        } else if on("facebook.com") {
            LinkKind::Facebook
        } else if on("qrz.com") {
            LinkKind::Qrz
        } else if parsed.path().starts_with("/@") {
            // mastodon profiles live on arbitrary instances
            LinkKind::Mastodon
        } else {
            LinkKind::Website
        }
    }

    /// icon name rendered by the templates.
    pub fn icon(&self) -> &'static str {
        match self {
            LinkKind::GitHub => "github",
            LinkKind::LinkedIn => "linkedin",
            LinkKind::Mastodon => "mastodon",
            LinkKind::Twitter => "twitter",
            LinkKind::YouTube => "youtube",
            LinkKind::Instagram => "instagram",
            LinkKind::Facebook => "facebook",
            LinkKind::Qrz => "radio",
            LinkKind::Website => "globe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatPlatform {
    WhatsApp,
    Signal,
    Sms,
    Other,
}

impl ChatPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatPlatform::WhatsApp => "whatsapp",
            ChatPlatform::Signal => "signal",
            ChatPlatform::Sms => "sms",
            ChatPlatform::Other => "other",
        }
    }
}

impl FromStr for ChatPlatform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whatsapp" => Ok(ChatPlatform::WhatsApp),
            "signal" => Ok(ChatPlatform::Signal),
            "sms" => Ok(ChatPlatform::Sms),
            "other" => Ok(ChatPlatform::Other),
            other => Err(Error::InvalidPlatform(other.to_string())),
        }
    }
}

/// who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    Me,
    Them,
}

impl ChatSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatSender::Me => "me",
            ChatSender::Them => "them",
        }
    }
}

impl FromStr for ChatSender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "me" => Ok(ChatSender::Me),
            "them" => Ok(ChatSender::Them),
            other => Err(Error::InvalidSender(other.to_string())),
        }
    }
}

/// a chat message to append to a contact's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChatEntry {
    pub contact_id: ContactId,
    pub platform: ChatPlatform,
    pub sender: ChatSender,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

impl NewChatEntry {
    /// trims the message; empty messages are rejected.
    pub fn new(
        contact_id: ContactId,
        platform: ChatPlatform,
        sender: ChatSender,
        message: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<Self, Error> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }
        Ok(Self {
            contact_id,
            platform,
            sender,
            message: message.to_string(),
            sent_at,
        })
    }
}

/// a stored chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: u64,
    pub contact_id: ContactId,
    pub platform: ChatPlatform,
    pub sender: ChatSender,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

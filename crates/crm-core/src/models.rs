//! Domain models shared by the import pipeline, repositories and API layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of the synthesized tax-id placeholder given to imported clients.
pub const PLACEHOLDER_DOCUMENT_PREFIX: &str = "TALKBI-";

/// A subscriber as returned by the TalkBI `GET /subscribers` endpoint.
///
/// Read-only from this system's point of view. Every field is optional
/// because the remote API omits blank values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContact {
    /// TalkBI subscriber identifier, stored locally as `external_id`.
    #[serde(default)]
    pub user_ns: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl RemoteContact {
    /// External identifier, ignoring blank strings.
    pub fn external_id(&self) -> Option<&str> {
        non_blank(self.user_ns.as_deref())
    }

    pub fn phone(&self) -> Option<&str> {
        non_blank(self.phone.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        non_blank(self.email.as_deref())
    }

    /// `name` if present, otherwise `first_name last_name`.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = non_blank(self.name.as_deref()) {
            return Some(name.to_string());
        }

        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        (!joined.is_empty()).then_some(joined)
    }

    /// True when the contact carries at least one way to reach the person.
    pub fn has_contact_channel(&self) -> bool {
        self.phone().is_some() || self.email().is_some()
    }
}

/// A client record as stored in the local database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Tax identifier. Imported clients get a synthesized placeholder.
    pub document: String,
    pub segment: Option<String>,
    /// TalkBI `user_ns` when the client is linked to a subscriber.
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to insert a new client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub document: String,
    pub segment: Option<String>,
    pub external_id: Option<String>,
}

impl NewClient {
    /// Builds a local client from a TalkBI contact.
    ///
    /// Returns `None` when the contact has no external id, or has neither a
    /// phone nor an email.
    pub fn from_remote(contact: &RemoteContact) -> Option<Self> {
        let external_id = contact.external_id()?;
        if !contact.has_contact_channel() {
            return None;
        }

        let phone = contact.phone().map(str::to_string);
        let email = contact.email().map(str::to_string);
        let name = contact
            .display_name()
            .or_else(|| phone.clone())
            .or_else(|| email.clone())
            .unwrap_or_default();

        Some(Self {
            name,
            document: placeholder_document(phone.as_deref(), external_id),
            phone,
            email,
            segment: None,
            external_id: Some(external_id.to_string()),
        })
    }
}

/// Fields of an existing client the import is allowed to overwrite.
///
/// `None` means "leave the stored value alone".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ContactUpdate {
    pub fn from_remote(contact: &RemoteContact) -> Self {
        Self {
            name: contact.display_name(),
            phone: contact.phone().map(str::to_string),
            email: contact.email().map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.email.is_none()
    }
}

/// Synthesizes the placeholder tax id for an imported client.
///
/// Uses the digits of the phone number, or the external id when the phone
/// carries no digits.
///
/// # Examples
///
/// ```
/// use crm_core::models::placeholder_document;
///
/// assert_eq!(placeholder_document(Some("+55 (11) 98765-4321"), "f1"), "TALKBI-5511987654321");
/// assert_eq!(placeholder_document(None, "f1"), "TALKBI-f1");
/// ```
pub fn placeholder_document(phone: Option<&str>, external_id: &str) -> String {
    let digits: String = phone
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        format!("{}{}", PLACEHOLDER_DOCUMENT_PREFIX, external_id)
    } else {
        format!("{}{}", PLACEHOLDER_DOCUMENT_PREFIX, digits)
    }
}

/// Body of a TalkBI `POST /subscriber/create` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberPayload {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl SubscriberPayload {
    /// Splits the client's name on the first space into first and last name.
    pub fn from_client(client: &Client) -> Self {
        let name = client.name.trim();
        let (first_name, last_name) = match name.split_once(char::is_whitespace) {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (name.to_string(), String::new()),
        };

        Self {
            first_name,
            last_name,
            phone: client.phone.clone(),
            email: client.email.clone(),
        }
    }
}

/// One page of contacts plus the pagination signals the API sent with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPage {
    pub contacts: Vec<RemoteContact>,
    /// `meta.current_page`, when present.
    pub current_page: Option<u32>,
    /// `meta.last_page`, when present.
    pub last_page: Option<u32>,
    /// `links.next`, when present.
    pub next_link: Option<String>,
}

impl ContactPage {
    pub fn new(contacts: Vec<RemoteContact>) -> Self {
        Self {
            contacts,
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, current_page: u32, last_page: u32) -> Self {
        self.current_page = Some(current_page);
        self.last_page = Some(last_page);
        self
    }

    pub fn with_next_link(mut self, next: impl Into<String>) -> Self {
        self.next_link = Some(next.into());
        self
    }

    /// Whether another page should be requested.
    ///
    /// An empty page always stops. Otherwise any of these signals continues:
    /// `current_page < last_page`, a non-empty `next` link, or a full page.
    pub fn has_next(&self, limit: u32) -> bool {
        if self.contacts.is_empty() {
            return false;
        }

        let meta_says_more = matches!(
            (self.current_page, self.last_page),
            (Some(current), Some(last)) if current < last
        );
        let link_says_more = self
            .next_link
            .as_deref()
            .is_some_and(|next| !next.trim().is_empty());
        let page_is_full = self.contacts.len() >= limit as usize;

        meta_says_more || link_says_more || page_is_full
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

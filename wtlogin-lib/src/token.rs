//! Token snapshots: export a logged-in session to JSON and restore it.
//!
//! Only serialization lives here; storing the string is up to the caller.
//! Two key spellings are read: the current one (`"mark": 1012`) and an older
//! one keyed by TLV names (`token_A4`, `token_A2`, `GUID_MD5`, `T10E`, ...).

use crate::constants::{FALLBACK_WT_SESSION_TICKET, FALLBACK_WT_SESSION_TICKET_KEY, TOKEN_SNAPSHOT_MARK};
use crate::error::LoginError;
use crate::session::{Cookies, SessionContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Serde adapter for byte fields stored as hex strings. Spaces are ignored
/// when reading.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(compact).map_err(serde::de::Error::custom)
    }
}

/// `UIN` is written as a string but older snapshots carry a number.
mod uin_field {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(uin: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&uin.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

/// `emp_time` as `%Y-%m-%d %H:%M:%S` (UTC). RFC 3339 is accepted on read.
mod emp_time_field {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(time: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_str(&t.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(text) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if text.is_empty() {
            return Ok(None);
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(&text, FORMAT) {
            return Ok(Some(naive.and_utc()));
        }
        DateTime::parse_from_rfc3339(&text)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

/// JSON shape of an exported session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    #[serde(rename = "UIN", with = "uin_field")]
    pub uin: u64,
    #[serde(rename = "D2", alias = "token_A2", with = "hex_bytes")]
    pub d2: Vec<u8>,
    #[serde(rename = "TGT", alias = "token_A4", with = "hex_bytes")]
    pub tgt: Vec<u8>,
    #[serde(rename = "Sharekey", with = "hex_bytes")]
    pub share_key: Vec<u8>,
    #[serde(rename = "Appid", default)]
    pub app_id: Option<u32>,
    #[serde(rename = "userSt_Key", alias = "T10E", with = "hex_bytes", default)]
    pub user_st_key: Vec<u8>,
    #[serde(rename = "userStSig", alias = "T114", with = "hex_bytes", default)]
    pub user_st_sig: Vec<u8>,
    #[serde(rename = "wtSessionTicket", alias = "T133", with = "hex_bytes", default)]
    pub wt_session_ticket: Vec<u8>,
    #[serde(rename = "wtSessionTicketKey", alias = "T134", with = "hex_bytes", default)]
    pub wt_session_ticket_key: Vec<u8>,
    #[serde(rename = "Guid", alias = "GUID_MD5", with = "hex_bytes")]
    pub guid: Vec<u8>,
    #[serde(default)]
    pub cookies: Cookies,
    #[serde(with = "emp_time_field", default)]
    pub emp_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mark: u32,
}

impl TokenSnapshot {
    pub fn from_session(ctx: &SessionContext) -> Self {
        Self {
            uin: ctx.uin,
            d2: ctx.tlv.d2.clone(),
            tgt: ctx.tlv.tgt.clone(),
            share_key: ctx.keys.share_key.clone(),
            app_id: Some(ctx.profile.app_id),
            user_st_key: ctx.tlv.user_st_key.clone(),
            user_st_sig: ctx.tlv.user_st_sig.clone(),
            wt_session_ticket: ctx.tlv.wt_session_ticket.clone(),
            wt_session_ticket_key: ctx.tlv.wt_session_ticket_key.clone(),
            guid: ctx.guid.to_vec(),
            cookies: ctx.cookies.clone(),
            emp_time: ctx.emp_time,
            mark: TOKEN_SNAPSHOT_MARK,
        }
    }

    /// Restore the snapshot into `ctx`, filling in the fallback session
    /// ticket when the snapshot has none.
    pub fn apply(self, ctx: &mut SessionContext) -> Result<(), LoginError> {
        ctx.guid = self.guid.as_slice().try_into().map_err(|_| LoginError::InsufficientData {
            expected: 16,
            actual: self.guid.len(),
        })?;
        ctx.uin = self.uin;
        if let Some(app_id) = self.app_id {
            ctx.profile.app_id = app_id;
        }
        ctx.keys.share_key = self.share_key;
        ctx.tlv.d2 = self.d2;
        ctx.tlv.tgt = self.tgt;
        ctx.tlv.user_st_key = self.user_st_key;
        ctx.tlv.user_st_sig = self.user_st_sig;
        ctx.tlv.wt_session_ticket = self.wt_session_ticket;
        ctx.tlv.wt_session_ticket_key = self.wt_session_ticket_key;

        if ctx.tlv.wt_session_ticket.is_empty() {
            warn!("Snapshot for {} has no session ticket, using the built-in one", ctx.uin);
            ctx.tlv.wt_session_ticket = FALLBACK_WT_SESSION_TICKET.to_vec();
            if ctx.tlv.wt_session_ticket_key.is_empty() {
                ctx.tlv.wt_session_ticket_key = FALLBACK_WT_SESSION_TICKET_KEY.to_vec();
            }
        }

        if self.mark == TOKEN_SNAPSHOT_MARK {
            ctx.emp_time = self.emp_time;
        }
        ctx.cookies = self.cookies;
        Ok(())
    }
}

/// Serialize the session's tokens to a JSON snapshot.
pub fn export(ctx: &SessionContext) -> Result<String, LoginError> {
    let json = serde_json::to_string(&TokenSnapshot::from_session(ctx))?;
    debug!("Exported token snapshot for {}", ctx.uin);
    Ok(json)
}

/// Restore tokens from a JSON snapshot in either key spelling.
pub fn import(ctx: &mut SessionContext, json: &str) -> Result<(), LoginError> {
    let snapshot: TokenSnapshot = serde_json::from_str(json)?;
    debug!("Importing token snapshot (mark {}) for {}", snapshot.mark, snapshot.uin);
    snapshot.apply(ctx)
}

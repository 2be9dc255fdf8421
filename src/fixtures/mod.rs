//! Test fixture generation and injection
//!
//! Fresh identity data is generated per case and written into a copy of the
//! request body; the suite's template body is never touched.

mod id_number;

#[cfg(test)]
pub use id_number::is_valid;
pub use id_number::{birth_date, IdNumberGenerator, RegionMode};

use serde_json::Value;

/// Body field holding the sensitive business payload
pub const DATA_FIELD: &str = "data";
const ID_FIELD: &str = "idNo";
const AUTH_INFO_FIELD: &str = "userAuthInfo";
const BIRTHDAY_FIELD: &str = "birthDay";

/// Values drawn for one case
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fixtures {
    pub id_number: String,
}

impl Fixtures {
    pub fn new(id_number: impl Into<String>) -> Self {
        Self {
            id_number: id_number.into(),
        }
    }

    pub fn birth_date(&self) -> Option<String> {
        birth_date(&self.id_number)
    }
}

/// Return a copy of `body` with fixture values written into `data`
///
/// `data.idNo` is replaced when present. A `data.userAuthInfo` object gets
/// `idNo` and the matching `birthDay`.
pub fn inject_fixtures(body: &Value, fixtures: &Fixtures) -> Value {
    let mut body = body.clone();

    let Some(data) = body.get_mut(DATA_FIELD).and_then(Value::as_object_mut) else {
        return body;
    };

    if data.contains_key(ID_FIELD) {
        data.insert(
            ID_FIELD.to_string(),
            Value::String(fixtures.id_number.clone()),
        );
    }

    if let Some(auth) = data.get_mut(AUTH_INFO_FIELD).and_then(Value::as_object_mut) {
        auth.insert(
            ID_FIELD.to_string(),
            Value::String(fixtures.id_number.clone()),
        );
        if let Some(birthday) = fixtures.birth_date() {
            auth.insert(BIRTHDAY_FIELD.to_string(), Value::String(birthday));
        }
    }

    body
}

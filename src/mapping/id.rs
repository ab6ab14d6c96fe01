//! Application identifier conversion.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{OgmError, Result};
use crate::graph::Rid;

/// Application identifier types usable with [`IdParser`].
pub trait EntityId: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> EntityId for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Converts between an application identifier type and record identities.
///
/// Implementations must be total over valid identifiers and mutually
/// inverse: `to_application_id(to_record_identifier(id)) == id`.
pub trait IdParser<ID>: Send + Sync {
    fn to_record_identifier(&self, id: &ID) -> Result<Rid>;

    fn to_application_id(&self, rid: &Rid) -> Result<ID>;
}

/// Identity mapping for entities keyed by [`Rid`] directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct RidIdParser;

impl IdParser<Rid> for RidIdParser {
    fn to_record_identifier(&self, id: &Rid) -> Result<Rid> {
        Ok(*id)
    }

    fn to_application_id(&self, rid: &Rid) -> Result<Rid> {
        Ok(*rid)
    }
}

/// Entities keyed by the textual `#cluster:position` form.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringIdParser;

impl IdParser<String> for StringIdParser {
    fn to_record_identifier(&self, id: &String) -> Result<Rid> {
        Rid::parse(id)
    }

    fn to_application_id(&self, rid: &Rid) -> Result<String> {
        Ok(rid.to_string())
    }
}

/// Produces the serialized application id for a rid, erasing `ID`.
pub(crate) trait IdEncoder: Send + Sync {
    fn encode(&self, rid: &Rid) -> Result<Value>;
}

pub(crate) struct ParserEncoder<ID> {
    parser: Arc<dyn IdParser<ID>>,
}

impl<ID> ParserEncoder<ID> {
    pub(crate) fn new(parser: Arc<dyn IdParser<ID>>) -> Self {
        Self { parser }
    }
}

impl<ID: EntityId> IdEncoder for ParserEncoder<ID> {
    fn encode(&self, rid: &Rid) -> Result<Value> {
        let id = self.parser.to_application_id(rid)?;
        serde_json::to_value(id).map_err(|e| OgmError::identity(rid, e.to_string()))
    }
}

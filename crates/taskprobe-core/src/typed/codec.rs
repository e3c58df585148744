//! InvocationCodec - Invocable とタスク payload の相互変換
//!
//! 遅延実行の記録は `{kind, args}` の JSON で、フォームの
//! `invocation` フィールドに 1 つだけ入ります。
//! プロセスをまたいで残るのはこの文字列だけです。

use serde::{Deserialize, Serialize};

use super::invocable::Invocable;
use crate::domain::errors::ProbeError;
use crate::domain::payload::FormPayload;

/// Form field holding the encoded record.
pub const INVOCATION_FIELD: &str = "invocation";

/// Tagged record of a deferred call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayedInvocation {
    pub kind: String,
    pub args: serde_json::Value,
}

impl DelayedInvocation {
    pub fn of<T: Invocable>(args: &T) -> Result<Self, CodecError> {
        Ok(Self {
            kind: T::KIND.to_string(),
            args: serde_json::to_value(args).map_err(CodecError::Json)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("payload has no 'invocation' field")]
    MissingRecord,

    #[error("invocation record is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
}

impl From<CodecError> for ProbeError {
    fn from(err: CodecError) -> Self {
        ProbeError::invalid_input(err.to_string()).with_source(err)
    }
}

pub struct InvocationCodec;

impl InvocationCodec {
    pub fn encode<T: Invocable>(args: &T) -> Result<FormPayload, CodecError> {
        let record = DelayedInvocation::of(args)?;
        let text = serde_json::to_string(&record).map_err(CodecError::Json)?;
        Ok(FormPayload::new().with(INVOCATION_FIELD, text))
    }

    pub fn decode(payload: &FormPayload) -> Result<DelayedInvocation, CodecError> {
        let text = payload
            .first(INVOCATION_FIELD)
            .ok_or(CodecError::MissingRecord)?;
        serde_json::from_str(text).map_err(CodecError::Json)
    }
}

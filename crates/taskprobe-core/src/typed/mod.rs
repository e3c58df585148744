//! Typed - 型付きの遅延実行 API
//!
//! 遅延実行はクロージャではなく「kind + 引数」のタグ付き記録として積み、
//! 実行側では静的なディスパッチ表から実装を引きます。
//!
//! # 二層構造
//! - **表層（Typed）**: `Invocable` trait, `Invoker<T>` trait - 型安全
//! - **内部（Dyn）**: `DynInvoker` trait - object-safe, type erasure

pub mod codec;
pub mod invocable;
pub mod invoker;
pub mod registry;
pub mod sleep_then_post;

pub use self::codec::{CodecError, DelayedInvocation, INVOCATION_FIELD, InvocationCodec};
pub use self::invocable::Invocable;
pub use self::invoker::{DynInvoker, Invoker, TypedInvoker};
pub use self::registry::{InvocableRegistry, RegistryError};
pub use self::sleep_then_post::{SleepThenPost, SleepThenPostInvoker};

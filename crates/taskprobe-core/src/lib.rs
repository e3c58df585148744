//! taskprobe-core
//!
//! Task-queue 挙動を観察するためのプローブ群のコア。HTTP には依存しません。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（TaskRequest, TaskHandle, AttemptContext, Outcome, errors, ...）
//! - **ports**: 抽象化レイヤー（TaskQueue, PeerClient, ServiceEnvironment, Clock, ...）
//! - **typed**: 型付きの遅延実行（Invocable trait, Invoker trait, InvocableRegistry, InvocationCodec）
//! - **impls**: 実装（InMemory / Local / Cloud Tasks のキュー、HTTP クライアント、環境）
//! - **app**: トリガーとワーカーの操作（ProbeBuilder, Probe）
//! - **config**: 起動時設定
//! - **observability**: ログ初期化と span

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

//! A2A task protocol: wire types, task storage, the executor and the
//! JSON-RPC request handler.

pub mod event_queue;
pub mod executor;
pub mod handler;
pub mod jsonrpc;
pub mod task_store;
pub mod types;

pub use event_queue::{EventQueue, QueueClosed};
pub use executor::{ExecutorError, RequestContext, TaskExecutor};
pub use handler::{EventStream, RequestHandler};
pub use jsonrpc::{JsonRpcRequest, JsonRpcResponse, RpcError};
pub use task_store::{InMemoryTaskStore, TaskStore, TaskStoreError};

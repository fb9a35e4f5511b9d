use crate::domain::model::{SoapRequest, TransportResponse};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// 接收原始線路內容的診斷輸出
pub trait DebugSink: Send + Sync {
    fn write(&self, line: &str);
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn uses_secure_transport(&self) -> bool;

    /// 傳入 `None` 會移除目前的輸出
    fn set_debug_output(&self, sink: Option<Arc<dyn DebugSink>>);

    async fn fetch(&self, url: &Url) -> Result<TransportResponse>;

    async fn post(&self, request: &SoapRequest) -> Result<TransportResponse>;
}

pub mod mock_transport;
pub mod temp_store;
pub mod transport;

pub use mock_transport::{json_response, MockCall, MockTransport};
pub use temp_store::{FileTempStore, MemoryTempStore, TempGuard, TempHandle, TempStore};
pub use transport::{
    ExtractionTransport, ReqwestTransport, TransportError, TransportResponse, UploadRequest,
};

pub mod attachment;

pub use attachment::{AttachmentError, AttachmentStore, UploadedFile};

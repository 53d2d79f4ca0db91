mod errors;
mod http;
mod releases;

pub use errors::CdnError;
pub use http::{fetch_json, shared_client};
pub use releases::{
    installer_asset, installer_download_url, CdnClient, ReleaseAsset, ReleaseEntry,
    INSTALLER_CONTENT_TYPE,
};

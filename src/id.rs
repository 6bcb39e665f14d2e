//! Generated node identifiers: `"node"` followed by 20 random bytes in
//! URL-safe base64.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use rand::RngCore;

pub(crate) fn generate_node_id() -> String {
    let mut raw = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut raw);
    format!("node{}", URL_SAFE.encode(raw))
}

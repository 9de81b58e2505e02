//! Storage key builders for every artifact prefix the pipeline writes. These are
//! `Storage`-relative keys (no workspace root prefix — the `Storage`
//! implementation owns that).

pub fn product_job_key(category: &str, product_id: &str) -> String {
    format!("specs/inputs/{category}/products/{product_id}.json")
}

pub fn catalog_key(category: &str) -> String {
    format!("helper_files/{category}/_control_plane/product_catalog.json")
}

pub fn rename_log_key(category: &str) -> String {
    format!("helper_files/{category}/_control_plane/rename_log.json")
}

pub fn overrides_key(category: &str, product_id: &str) -> String {
    format!("helper_files/{category}/_overrides/{product_id}.overrides.json")
}

pub const BRAND_REGISTRY_KEY: &str = "helper_files/_global/brand_registry.json";
pub const BRAND_RENAME_LOG_KEY: &str = "helper_files/_global/brand_rename_log.json";

pub fn queue_state_key(category: &str) -> String {
    format!("_queue/{category}/state.json")
}

pub fn latest_prefix(output_prefix: &str, category: &str, product_id: &str) -> String {
    format!("{output_prefix}/{category}/{product_id}/latest")
}

pub fn runs_prefix(output_prefix: &str, category: &str, product_id: &str) -> String {
    format!("{output_prefix}/{category}/{product_id}/runs")
}

pub fn review_prefix(category: &str, product_id: &str) -> String {
    format!("final/{category}/{product_id}/review")
}

pub fn final_prefix(category: &str, product_id: &str) -> String {
    format!("final/{category}/{product_id}")
}

pub fn published_prefix(category: &str, product_id: &str) -> String {
    format!("{category}/published/{product_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_storage_layout() {
        assert_eq!(product_job_key("mouse", "mouse-acme-x1"), "specs/inputs/mouse/products/mouse-acme-x1.json");
        assert_eq!(catalog_key("mouse"), "helper_files/mouse/_control_plane/product_catalog.json");
        assert_eq!(queue_state_key("mouse"), "_queue/mouse/state.json");
        assert_eq!(published_prefix("mouse", "mouse-acme-x1"), "mouse/published/mouse-acme-x1");
    }
}

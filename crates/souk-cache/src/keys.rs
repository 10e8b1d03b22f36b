//! Cache key templates
//!
//! Logical keys follow fixed templates per domain object so that
//! pattern-based invalidation (`products:{vendor}:*`) reliably targets
//! every derived key. Consumers must build keys through these helpers
//! rather than formatting strings by hand.

use regex::Regex;

/// Translate a Redis-style glob (`*` wildcards only) into an anchored regex
pub(crate) fn glob_to_regex(pattern: &str) -> Option<Regex> {
	let mut regex = String::with_capacity(pattern.len() + 4);
	regex.push('^');
	for ch in pattern.chars() {
		match ch {
			'*' => regex.push_str(".*"),
			c => regex.push_str(&regex::escape(&c.to_string())),
		}
	}
	regex.push('$');
	Regex::new(&regex).ok()
}

/// Key for a single product
pub fn product(id: &str) -> String {
	format!("product:{id}")
}

/// Key for a vendor's product listing, optionally scoped to a category
pub fn vendor_products(vendor_id: &str, category_id: Option<&str>) -> String {
	format!("products:{vendor_id}:{}", category_id.unwrap_or("all"))
}

/// Key for a vendor profile
pub fn vendor(id: &str) -> String {
	format!("vendor:{id}")
}

/// Key for a product's inventory record
pub fn inventory(product_id: &str) -> String {
	format!("inventory:product:{product_id}")
}

/// Key for a vendor's analytics dashboard for a reporting period
pub fn analytics_dashboard(vendor_id: &str, period: &str) -> String {
	format!("analytics:dashboard:{vendor_id}:{period}")
}

/// Key for a session
pub fn session(id: &str) -> String {
	format!("session:{id}")
}

/// Glob pattern matching every product listing of one vendor
pub fn vendor_products_pattern(vendor_id: &str) -> String {
	format!("products:{vendor_id}:*")
}

/// Glob pattern matching every product and product listing
pub fn all_products_pattern() -> &'static str {
	"product*"
}

/// Glob pattern matching every vendor profile
pub fn all_vendors_pattern() -> &'static str {
	"vendor:*"
}

/// Glob pattern matching every inventory record
pub fn all_inventory_pattern() -> &'static str {
	"inventory:*"
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_key_templates() {
		assert_eq!(product("42"), "product:42");
		assert_eq!(vendor_products("v1", Some("toys")), "products:v1:toys");
		assert_eq!(vendor_products("v1", None), "products:v1:all");
		assert_eq!(vendor("v1"), "vendor:v1");
		assert_eq!(inventory("42"), "inventory:product:42");
		assert_eq!(
			analytics_dashboard("v1", "30d"),
			"analytics:dashboard:v1:30d"
		);
		assert_eq!(session("abc"), "session:abc");
	}

	#[test]
	fn test_glob_translation_anchors_and_escapes() {
		let re = glob_to_regex("products:v.1:*").unwrap();
		assert!(re.is_match("products:v.1:toys"));
		// The dot is literal, not a regex wildcard
		assert!(!re.is_match("products:vX1:toys"));
		// Anchored at both ends
		assert!(!re.is_match("x:products:v.1:toys"));
	}

	#[test]
	fn test_patterns_cover_templates() {
		assert_eq!(vendor_products_pattern("v1"), "products:v1:*");
		assert!(vendor_products("v1", None).starts_with("products:v1:"));
		assert!(vendor("v1").starts_with("vendor:"));
		assert!(inventory("42").starts_with("inventory:"));
	}
}

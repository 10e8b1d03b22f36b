//! Client identification from request headers

use http::HeaderMap;

/// Resolves the client identifier used as the rate-limit key.
///
/// Checks proxy headers in precedence order: the first hop of
/// `X-Forwarded-For`, then `X-Real-IP`, then `CF-Connecting-IP`.
/// Returns `"unknown"` when none carry a usable value, so clients
/// behind broken proxies share one conservative bucket instead of
/// escaping rate limiting entirely.
pub fn client_identifier(headers: &HeaderMap) -> String {
	if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
		if let Some(first_hop) = forwarded.split(',').next() {
			let first_hop = first_hop.trim();
			if !first_hop.is_empty() {
				return first_hop.to_string();
			}
		}
	}

	if let Some(real_ip) = header_str(headers, "x-real-ip") {
		return real_ip.trim().to_string();
	}

	if let Some(cf_ip) = header_str(headers, "cf-connecting-ip") {
		return cf_ip.trim().to_string();
	}

	"unknown".to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers
		.get(name)
		.and_then(|value| value.to_str().ok())
		.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
		let mut map = HeaderMap::new();
		for (name, value) in pairs {
			map.insert(
				http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
				value.parse().unwrap(),
			);
		}
		map
	}

	#[test]
	fn test_forwarded_for_uses_first_hop() {
		let headers = headers(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1, 10.0.0.2")]);
		assert_eq!(client_identifier(&headers), "203.0.113.9");
	}

	#[test]
	fn test_forwarded_for_takes_precedence() {
		let headers = headers(&[
			("x-forwarded-for", "203.0.113.9"),
			("x-real-ip", "198.51.100.4"),
			("cf-connecting-ip", "192.0.2.7"),
		]);
		assert_eq!(client_identifier(&headers), "203.0.113.9");
	}

	#[test]
	fn test_real_ip_fallback() {
		let headers = headers(&[("x-real-ip", "198.51.100.4")]);
		assert_eq!(client_identifier(&headers), "198.51.100.4");
	}

	#[test]
	fn test_cf_connecting_ip_fallback() {
		let headers = headers(&[("cf-connecting-ip", "192.0.2.7")]);
		assert_eq!(client_identifier(&headers), "192.0.2.7");
	}

	#[test]
	fn test_no_headers_is_unknown() {
		assert_eq!(client_identifier(&HeaderMap::new()), "unknown");
	}

	#[test]
	fn test_empty_forwarded_for_falls_through() {
		let headers = headers(&[("x-forwarded-for", "  "), ("x-real-ip", "198.51.100.4")]);
		assert_eq!(client_identifier(&headers), "198.51.100.4");
	}
}

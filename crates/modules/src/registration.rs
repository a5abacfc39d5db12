//! Registration string matching and normalization.
//!
//! A registration is a `/`-separated path; each path segment is a set of
//! `.`-separated attribute tokens. A leading `_` marks a token as
//! implementation-specific: optional during matching and removed by
//! attribute-stripped normalization. Examples:
//!
//! ```text
//! //color/icc.lcms._cpu
//! //vendor/effect.colorspace
//! ```

/// Normalization mode for [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
	/// Keep the registration as written.
	Full,
	/// Remove every `_`-prefixed, implementation-specific token.
	StripImplementationAttr,
}

fn segments(registration: &str) -> Vec<&str> {
	registration.split('/').collect()
}

fn attributes(segment: &str) -> impl Iterator<Item = &str> {
	segment.split('.').filter(|token| !token.is_empty())
}

fn strip_marker(token: &str) -> &str {
	token.strip_prefix('_').unwrap_or(token)
}

/// Compares a requested registration against a candidate's and returns a
/// rank.
///
/// Segment by segment, left to right, every required (non-`_`) attribute
/// token of `requested` must appear in the candidate's segment; a missing
/// required token fails the whole match with rank 0. The rank is the count
/// of matched attribute tokens across the compared segments; a structurally
/// compatible pair with no counted attributes still ranks 1. A shorter path
/// on either side is an allowed prefix match. The empty `requested`
/// wildcard and the compatibility-version bonus are the caller's concern;
/// here an empty string on either side ranks 0.
pub fn match_rank(requested: &str, candidate: &str) -> i32 {
	if requested.is_empty() || candidate.is_empty() {
		return 0;
	}

	let mut rank = 0i32;
	for (req_seg, cand_seg) in segments(requested).iter().zip(segments(candidate).iter()) {
		let cand_tokens: Vec<&str> = attributes(cand_seg).map(strip_marker).collect();
		for token in attributes(req_seg) {
			let required = !token.starts_with('_');
			if cand_tokens.contains(&strip_marker(token)) {
				rank += 1;
			} else if required {
				return 0;
			}
		}
	}

	// Nothing counted but nothing required failed either: weak match.
	if rank == 0 { 1 } else { rank }
}

/// Rewrites a registration under the given mode.
///
/// Stripping removes every `_`-prefixed token from every segment and is
/// idempotent; it decides whether two differently-versioned candidates
/// denote the same capability.
pub fn normalize(registration: &str, mode: NormalizeMode) -> String {
	match mode {
		NormalizeMode::Full => registration.to_string(),
		NormalizeMode::StripImplementationAttr => registration
			.split('/')
			.map(|segment| {
				segment
					.split('.')
					.filter(|token| !token.starts_with('_'))
					.collect::<Vec<_>>()
					.join(".")
			})
			.collect::<Vec<_>>()
			.join("/"),
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn exact_match_counts_all_tokens() {
		let reg = "//vendor/effect.colorspace";
		assert_eq!(match_rank(reg, reg), 3);
	}

	#[test]
	fn missing_required_attribute_is_a_hard_mismatch() {
		assert_eq!(match_rank("//vendor/effect.colorspace", "//vendor/effect"), 0);
		assert_eq!(match_rank("//color/icc.lcms", "//color/icc.qcms"), 0);
	}

	#[test]
	fn optional_attribute_mismatch_is_soft() {
		// `_lcms` is implementation-specific: its absence lowers the rank
		// but does not fail the match.
		assert_eq!(match_rank("//color/icc._lcms", "//color/icc.qcms"), 2);
		assert_eq!(match_rank("//color/icc._lcms", "//color/icc._lcms"), 3);
	}

	#[test]
	fn shorter_requested_path_is_a_prefix_match() {
		assert_eq!(match_rank("//color", "//color/icc.lcms.context"), 1);
	}

	#[test]
	fn empty_strings_never_match() {
		assert_eq!(match_rank("", "//color/icc"), 0);
		assert_eq!(match_rank("//color/icc", ""), 0);
		assert_eq!(match_rank("", ""), 0);
	}

	#[test]
	fn marker_is_ignored_for_token_identity() {
		// A candidate advertising `_cpu` satisfies a request for `cpu`.
		assert_eq!(match_rank("//scale/fast.cpu", "//scale/fast._cpu"), 3);
	}

	#[test]
	fn reflexive_beats_degraded() {
		let reg = "//color/icc.lcms.context";
		let degraded = "//color/icc.lcms";
		assert!(match_rank(reg, reg) > match_rank(reg, degraded));
		assert_eq!(match_rank(reg, degraded), 0);
	}

	#[test]
	fn strip_removes_implementation_tokens() {
		assert_eq!(
			normalize("//color/icc.lcms._cpu._v2", NormalizeMode::StripImplementationAttr),
			"//color/icc.lcms"
		);
		assert_eq!(
			normalize("//vendor/effect.colorspace", NormalizeMode::StripImplementationAttr),
			"//vendor/effect.colorspace"
		);
	}

	#[test]
	fn full_mode_is_identity() {
		let reg = "//color/icc._impl";
		assert_eq!(normalize(reg, NormalizeMode::Full), reg);
	}

	fn arb_registration() -> impl Strategy<Value = String> {
		let token = prop::string::string_regex("_?[a-z][a-z0-9]{0,5}").unwrap();
		let segment = prop::collection::vec(token, 0..4).prop_map(|t| t.join("."));
		prop::collection::vec(segment, 1..5).prop_map(|s| s.join("/"))
	}

	proptest! {
		/// Stripping twice equals stripping once.
		#[test]
		fn prop_normalize_idempotent(reg in arb_registration()) {
			let once = normalize(&reg, NormalizeMode::StripImplementationAttr);
			let twice = normalize(&once, NormalizeMode::StripImplementationAttr);
			prop_assert_eq!(once, twice);
		}

		/// A registration always satisfies itself unless empty.
		#[test]
		fn prop_self_match(reg in arb_registration()) {
			if !reg.is_empty() {
				prop_assert!(match_rank(&reg, &reg) > 0);
			}
		}
	}
}

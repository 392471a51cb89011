use std::{fs, rc::Rc};

use super::*;

fn preprocess_with(
	registry: &IncludeRegistry,
	defines: &[(&str, &str)],
	source: &str,
) -> Result<(String, LineMap), PreprocError> {
	let paths = IncludePaths::new(Vec::<String>::new());
	let mut preprocessor = Preprocessor::new(registry, &paths);
	for (k, v) in defines {
		preprocessor.define(*k, *v);
	}
	preprocessor.preprocess("main", source, 1)
}

fn error_type(source: &str) -> PreprocErrorType {
	preprocess_with(&IncludeRegistry::new(), &[("quality", "high")], source).unwrap_err().ty
}

#[test]
fn test_preprocessor() {
	let registry = IncludeRegistry::new();
	let paths = IncludePaths::new(["src/preprocessor/test"]);
	let mut preprocessor = Preprocessor::new(&registry, &paths);
	preprocessor.define("quality", "high").define("LIGHT_SCALE", "0.5");

	let (text, line_map) = preprocessor
		.preprocess(
			"test_preprocessor.glsl",
			&fs::read_to_string("src/preprocessor/test/test_preprocessor.glsl").unwrap(),
			1,
		)
		.unwrap();

	assert_eq!(text, fs::read_to_string("src/preprocessor/test/test.glsl.results").unwrap());

	let main = Rc::new("test_preprocessor.glsl".to_string());
	let inc = Rc::new("include.glsl".to_string());
	let light = Rc::new("lighting.glsl".to_string());

	#[rustfmt::skip]
	assert_eq!(line_map.iter().cloned().collect::<Vec<_>>(), vec![
		LineId { line: 1, file: main.clone() },
		LineId { line: 1, file: inc.clone() },
		LineId { line: 2, file: inc.clone() },
		LineId { line: 3, file: inc.clone() },
		LineId { line: 2, file: light.clone() },
		LineId { line: 3, file: light.clone() },
		LineId { line: 4, file: light.clone() },
		LineId { line: 8, file: main.clone() },
		LineId { line: 10, file: main.clone() },
		LineId { line: 11, file: main.clone() },
		LineId { line: 12, file: main.clone() },
	]);

	// @define inside the processed source must not leak out
	assert!(preprocessor.defines().get("TAPS").is_none());
}

#[test]
fn registry_shadows_search_paths() {
	let mut registry = IncludeRegistry::new();
	registry.insert("include.glsl", "const float registry_wins = 1.0;\n");

	let paths = IncludePaths::new(["src/preprocessor/test"]);
	let (text, _) = Preprocessor::new(&registry, &paths)
		.preprocess("main", "#include <include.glsl>\n", 1)
		.unwrap();

	assert_eq!(text, "const float registry_wins = 1.0;\n");
}

#[test]
fn first_line_offsets_the_map() {
	let registry = IncludeRegistry::new();
	let paths = IncludePaths::default();
	let (_, line_map) = Preprocessor::new(&registry, &paths)
		.preprocess("Blur.Vertex", "#version 450\nvoid main() {}\n", 17)
		.unwrap();
	assert_eq!(line_map.get(2).map(|id| id.line), Some(18));
}

#[test]
fn include_cycle() {
	let mut registry = IncludeRegistry::new();
	registry.insert("a.glsl", "#include \"b.glsl\"\n");
	registry.insert("b.glsl", "// b\n#include \"a.glsl\"\n");

	let err = preprocess_with(&registry, &[], "#include \"a.glsl\"\n").unwrap_err();
	assert!(matches!(err.ty, PreprocErrorType::IncludeCycle(ref name) if name == "a.glsl"));
	assert_eq!(&*err.span.file, "b.glsl");
	assert_eq!(err.span.line, 2);
}

#[test]
fn same_include_twice_is_not_a_cycle() {
	let mut registry = IncludeRegistry::new();
	registry.insert("x.glsl", "// x\n");

	let (text, _) = preprocess_with(&registry, &[], "#include \"x.glsl\"\n#include \"x.glsl\"\n").unwrap();
	assert_eq!(text, "// x\n// x\n");
}

#[test]
fn unresolved_and_malformed_includes() {
	assert!(matches!(
		error_type("#include \"nowhere.glsl\""),
		PreprocErrorType::UnresolvedInclude(ref name) if name == "nowhere.glsl"
	));
	assert!(matches!(error_type("#include nowhere.glsl"), PreprocErrorType::Malformed(_)));
	assert!(matches!(error_type("#include \"\""), PreprocErrorType::Malformed(_)));
}

#[test]
fn include_needs_a_separator() {
	let (text, _) = preprocess_with(&IncludeRegistry::new(), &[], "#includefoo\n#include_guard x\n").unwrap();
	assert_eq!(text, "#includefoo\n#include_guard x\n");

	assert!(matches!(error_type("#include"), PreprocErrorType::Malformed(_)));
	assert!(matches!(error_type("#include   "), PreprocErrorType::Malformed(_)));
}

#[test]
fn skipped_case_ignores_includes_and_defines() {
	let source = "@match quality\n\
	              @case low\n\
	              #include \"nowhere.glsl\"\n\
	              @define SCALE 1\n\
	              @case high\n\
	              @define SCALE 2\n\
	              @endmatch\n\
	              float s = $SCALE;\n";

	let (text, _) = preprocess_with(&IncludeRegistry::new(), &[("quality", "high")], source).unwrap();
	assert_eq!(text, "float s = 2;\n");
}

#[test]
fn nested_match_in_skipped_case() {
	let source = "@match quality\n\
	              @case low\n\
	              @match undefined_target\n\
	              @case anything\n\
	              never\n\
	              @endmatch\n\
	              @case high\n\
	              kept\n\
	              @endmatch\n";

	let (text, _) = preprocess_with(&IncludeRegistry::new(), &[("quality", "high")], source).unwrap();
	assert_eq!(text, "kept\n");
}

#[test]
fn match_errors() {
	assert!(matches!(
		error_type("@match quality\n@case low\n@endmatch"),
		PreprocErrorType::MissedCase(ref case) if case == "high"
	));
	assert!(matches!(
		error_type("@match quality\n@case high | low\n@case low\n@endmatch"),
		PreprocErrorType::DuplicateCase(ref case) if case == "low"
	));
	assert!(matches!(error_type("@match quality\nstray\n@endmatch"), PreprocErrorType::Other(_)));
	assert!(matches!(error_type("@match quality\n@case high\n"), PreprocErrorType::Other(_)));
	assert!(matches!(error_type("@match missing\n"), PreprocErrorType::UndefinedTarget(_)));
	assert!(matches!(error_type("@match"), PreprocErrorType::Malformed(_)));
	assert!(matches!(error_type("@case high"), PreprocErrorType::Other(_)));
	assert!(matches!(error_type("@endmatch"), PreprocErrorType::Other(_)));
}

#[test]
fn substitution_errors() {
	assert!(matches!(
		error_type("float x = $MISSING;"),
		PreprocErrorType::Undefined(ref name) if name == "MISSING"
	));
	assert!(matches!(error_type("float x = $;"), PreprocErrorType::Malformed(_)));
	assert!(matches!(error_type("@define ONLY_KEY"), PreprocErrorType::Malformed(_)));
	assert!(matches!(error_type("@pragma once"), PreprocErrorType::UnknownDirective));
}

#[test]
fn substitution_stops_at_identifier_end() {
	let (text, _) =
		preprocess_with(&IncludeRegistry::new(), &[("N", "3")], "vec$N v[$N];\n").unwrap();
	assert_eq!(text, "vec3 v[3];\n");
}

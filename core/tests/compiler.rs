//! Declaration checks performed when an endpoint is compiled.

mod common;

use std::collections::BTreeSet;

use common::{courier, Contributor, ScriptedTransport};
use courier_core::{Courier, Endpoint, HttpMethod, Param, ParamAnnotation};
use test_log::test;

fn client() -> Courier {
    courier(&ScriptedTransport::new())
}

fn compile_error<T: Send + 'static>(endpoint: Endpoint<T>) -> String {
    client().load(&endpoint).unwrap_err().to_string()
}

fn for_method(message: &str, endpoint: &str) -> String {
    format!("{message}\n    for method {endpoint}")
}

// --- method declarations ---

#[test]
fn verb_is_required() {
    let endpoint = Endpoint::named("Api.none")
        .param(Param::query("q"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(endpoint),
        for_method("HTTP method declaration is required (e.g., get, post, etc.).", "Api.none")
    );
}

#[test]
fn only_one_verb() {
    let endpoint = Endpoint::named("Api.both")
        .get("a")
        .post("b")
        .returns_raw::<String>();
    assert_eq!(
        compile_error(endpoint),
        for_method("Only one HTTP method is allowed. Found: GET and POST.", "Api.both")
    );
}

#[test]
fn encodings_need_a_body_verb_and_exclude_each_other() {
    let multipart_get = Endpoint::named("Api.upload")
        .get("upload")
        .multipart()
        .returns_raw::<String>();
    assert!(compile_error(multipart_get)
        .starts_with("Multipart can only be specified on HTTP methods with request body"));

    let form_get = Endpoint::named("Api.login")
        .get("login")
        .form_url_encoded()
        .returns_raw::<String>();
    assert!(compile_error(form_get)
        .starts_with("FormUrlEncoded can only be specified on HTTP methods with request body"));

    let both = Endpoint::named("Api.both")
        .post("login")
        .form_url_encoded()
        .multipart()
        .returns_raw::<String>();
    assert_eq!(
        compile_error(both),
        for_method("Only one encoding annotation is allowed.", "Api.both")
    );
}

#[test]
fn header_declarations_are_checked() {
    let empty = Endpoint::named("Api.h")
        .get("x")
        .headers(Vec::<String>::new())
        .returns_raw::<String>();
    assert_eq!(compile_error(empty), for_method("Headers declaration is empty.", "Api.h"));

    let no_colon = Endpoint::named("Api.h")
        .get("x")
        .headers(["Accept"])
        .returns_raw::<String>();
    assert_eq!(
        compile_error(no_colon),
        for_method(
            r#"Headers value must be in the form "Name: Value". Found: "Accept""#,
            "Api.h"
        )
    );

    let bad_media_type = Endpoint::named("Api.h")
        .post("x")
        .headers(["Content-Type: json"])
        .returns_raw::<String>();
    assert_eq!(
        compile_error(bad_media_type),
        for_method("Malformed content type: json", "Api.h")
    );
}

#[test]
fn static_query_cannot_hold_placeholders() {
    let endpoint = Endpoint::named("Api.search")
        .get("search?q={q}")
        .returns_raw::<String>();
    assert!(compile_error(endpoint).starts_with(
        r#"URL query string "q={q}" must not have replace block. For dynamic query parameters use a Query parameter."#
    ));
}

#[test]
fn missing_url() {
    let endpoint = Endpoint::named("Api.root").get("").returns_raw::<String>();
    assert_eq!(
        compile_error(endpoint),
        for_method("Missing either GET URL or Url parameter.", "Api.root")
    );
}

#[test]
fn head_requires_unit_result() {
    let endpoint = Endpoint::named("Api.ping").head("ping").returns_raw::<String>();
    assert_eq!(
        compile_error(endpoint),
        for_method("HEAD method must use () as response type.", "Api.ping")
    );
    let ok = Endpoint::named("Api.ping").head("ping").returns_raw::<()>();
    assert!(client().load(&ok).is_ok());
}

#[test]
fn unconvertible_result_lists_the_factories_tried() {
    let courier = Courier::builder()
        .base_url("https://api.github.com/")
        .transport(std::sync::Arc::new(ScriptedTransport::new()))
        .without_json()
        .build()
        .unwrap();
    let endpoint = Endpoint::named("GitHub.contributors")
        .get("repos/square/retrofit/contributors")
        .returns::<Vec<Contributor>>();
    let message = courier.load(&endpoint).unwrap_err().to_string();
    assert!(message.starts_with("Unable to create converter for alloc::vec::Vec<"), "{message}");
    assert!(message.contains("Could not locate ResponseBody converter for"), "{message}");
    assert!(message.contains("Tried:\n   * courier_core::converter::BuiltInConverters"), "{message}");
}

// --- parameter declarations ---

#[test]
fn each_parameter_needs_exactly_one_binding() {
    let none = Endpoint::named("Api.p")
        .get("x")
        .param(Param::new(Vec::new()))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(none),
        for_method("No binding annotation found. (parameter #1)", "Api.p")
    );

    let two = Endpoint::named("Api.p")
        .get("x")
        .param(Param::query("q").and(ParamAnnotation::HeaderMap))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(two),
        for_method("Multiple binding annotations found, only one allowed. (parameter #1)", "Api.p")
    );
}

#[test]
fn path_rules() {
    let after_query = Endpoint::named("Api.p")
        .get("users/{user}")
        .param(Param::query("q"))
        .param(Param::path("user"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(after_query),
        for_method("A Path parameter must not come after a Query. (parameter #2)", "Api.p")
    );

    let unknown = Endpoint::named("Api.p")
        .get("users/{user}")
        .param(Param::path("user"))
        .param(Param::path("name"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(unknown),
        for_method(r#"URL "users/{user}" does not contain "{name}". (parameter #2)"#, "Api.p")
    );

    let twice = Endpoint::named("Api.p")
        .get("users/{user}")
        .param(Param::path("user"))
        .param(Param::path("user"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(twice),
        for_method(r#"Path parameter "user" is bound more than once. (parameter #2)"#, "Api.p")
    );

    let bad_name = Endpoint::named("Api.p")
        .get("users/{user}")
        .param(Param::path("1user"))
        .returns_raw::<String>();
    assert!(compile_error(bad_name).starts_with("Path parameter name must match"));
}

#[test]
fn unbound_placeholder_is_rejected() {
    let endpoint = Endpoint::named("GitHub.contributors")
        .get("repos/{owner}/{repo}/contributors")
        .param(Param::path("owner"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(endpoint),
        for_method(
            r#"URL "repos/{owner}/{repo}/contributors" contains "{repo}" but no Path parameter binds it."#,
            "GitHub.contributors"
        )
    );
}

/// Small deterministic generator for the declaration property below.
struct Lcg(u64);

impl Lcg {
    fn below(&mut self, n: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) % n as u64) as usize
    }

    fn chance(&mut self, one_in: usize) -> bool {
        self.below(one_in) == 0
    }
}

const NAMES: [&str; 6] = ["owner", "repo", "branch", "sha", "path_1", "x-y"];
const LITERALS: [&str; 4] = ["repos", "branches", "v1", "git"];

#[test]
fn placeholders_compile_only_when_bound_exactly_once() {
    let mut rng = Lcg(0x5eed);
    let (mut accepted, mut rejected) = (0, 0);
    for case in 0..500 {
        // Template: literals and placeholders in random order, names may repeat.
        let mut segments = vec![LITERALS[rng.below(LITERALS.len())].to_string()];
        let mut placeholders = BTreeSet::new();
        for _ in 0..rng.below(6) {
            if rng.chance(3) {
                segments.push(LITERALS[rng.below(LITERALS.len())].to_string());
            } else {
                let name = NAMES[rng.below(NAMES.len())];
                placeholders.insert(name);
                segments.push(format!("{{{name}}}"));
            }
        }
        let template = segments.join("/");

        // Bindings: usually each placeholder once, sometimes one dropped,
        // duplicated, or a name the template does not have.
        let mut bound: Vec<&str> = placeholders.iter().copied().filter(|_| !rng.chance(6)).collect();
        if !bound.is_empty() && rng.chance(5) {
            bound.push(bound[rng.below(bound.len())]);
        }
        if rng.chance(5) {
            bound.push(NAMES[rng.below(NAMES.len())]);
        }
        for i in (1..bound.len()).rev() {
            bound.swap(i, rng.below(i + 1));
        }

        let mut builder = Endpoint::named(format!("Api.generated{case}")).get(&template);
        for name in &bound {
            builder = builder.param(Param::path(name));
        }
        let result = client().load(&builder.returns_raw::<String>());

        let distinct: BTreeSet<&str> = bound.iter().copied().collect();
        let exactly_once = distinct.len() == bound.len() && distinct == placeholders;
        assert_eq!(
            result.is_ok(),
            exactly_once,
            "template {template} bound {bound:?}: {:?}",
            result.err().map(|e| e.to_string())
        );
        if exactly_once {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }
    assert!(accepted > 50 && rejected > 50, "accepted {accepted}, rejected {rejected}");
}

#[test]
fn url_parameter_rules() {
    let with_path = Endpoint::named("Api.u")
        .get("users")
        .param(Param::url())
        .returns_raw::<String>();
    assert_eq!(
        compile_error(with_path),
        for_method("Url cannot be used with GET URL (parameter #1)", "Api.u")
    );

    let wrong_type = Endpoint::named("Api.u")
        .get("")
        .param(Param::url().of_type::<u32>())
        .returns_raw::<String>();
    assert_eq!(
        compile_error(wrong_type),
        for_method("Url parameter type must be String or url::Url. (parameter #1)", "Api.u")
    );

    let twice = Endpoint::named("Api.u")
        .get("")
        .param(Param::url())
        .param(Param::url())
        .returns_raw::<String>();
    assert_eq!(
        compile_error(twice),
        for_method("Multiple Url parameters found. (parameter #2)", "Api.u")
    );

    let after_query = Endpoint::named("Api.u")
        .get("")
        .param(Param::query("q"))
        .param(Param::url())
        .returns_raw::<String>();
    assert_eq!(
        compile_error(after_query),
        for_method("A Url parameter must not come after a Query. (parameter #2)", "Api.u")
    );

    let ok = Endpoint::named("Api.u")
        .get("")
        .param(Param::url().of_type::<url::Url>())
        .param(Param::query("q"))
        .returns_raw::<String>();
    assert!(client().load(&ok).is_ok());
}

#[test]
fn body_rules() {
    let on_get = Endpoint::named("Api.b")
        .get("items")
        .param(Param::body())
        .returns_raw::<String>();
    assert_eq!(
        compile_error(on_get),
        for_method("Non-body HTTP method cannot contain Body.", "Api.b")
    );

    let with_form = Endpoint::named("Api.b")
        .post("items")
        .form_url_encoded()
        .param(Param::field("name"))
        .param(Param::body())
        .returns_raw::<String>();
    assert_eq!(
        compile_error(with_form),
        for_method(
            "Body parameters cannot be used with form or multi-part encoding. (parameter #2)",
            "Api.b"
        )
    );

    let twice = Endpoint::named("Api.b")
        .post("items")
        .param(Param::body())
        .param(Param::body())
        .returns_raw::<String>();
    assert_eq!(
        compile_error(twice),
        for_method("Multiple Body parameters found. (parameter #2)", "Api.b")
    );

    let unconvertible = Endpoint::named("Api.b")
        .post("items")
        .param(Param::body().of_type::<std::time::Duration>())
        .returns_raw::<String>();
    assert!(compile_error(unconvertible).starts_with("Unable to create Body converter for core::time::Duration"));

    let custom_verb = Endpoint::named("Api.b")
        .http("DELETE", "items/1", true)
        .param(Param::body())
        .returns_raw::<String>();
    assert!(client().load(&custom_verb).is_ok());
}

#[test]
fn form_and_multipart_need_their_parameters() {
    let empty_form = Endpoint::named("Api.f")
        .post("login")
        .form_url_encoded()
        .param(Param::query("q"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(empty_form),
        for_method("Form-encoded method must contain at least one Field.", "Api.f")
    );

    let empty_multipart = Endpoint::named("Api.m").post("upload").multipart().returns_raw::<String>();
    assert_eq!(
        compile_error(empty_multipart),
        for_method("Multipart method must contain at least one Part.", "Api.m")
    );

    let stray_field = Endpoint::named("Api.f")
        .post("login")
        .param(Param::field("user"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(stray_field),
        for_method("Field parameters can only be used with form encoding. (parameter #1)", "Api.f")
    );

    let stray_part = Endpoint::named("Api.m")
        .post("upload")
        .param(Param::part("file"))
        .returns_raw::<String>();
    assert_eq!(
        compile_error(stray_part),
        for_method("Part parameters can only be used with multipart encoding. (parameter #1)", "Api.m")
    );
}

#[test]
fn part_naming_rules() {
    let unnamed_scalar = Endpoint::named("Api.m")
        .post("upload")
        .multipart()
        .param(Param::new(vec![ParamAnnotation::Part {
            name: None,
            encoding: "binary".to_string(),
        }]))
        .returns_raw::<String>();
    assert!(compile_error(unnamed_scalar)
        .starts_with("Part declaration must supply a name or use the multipart Part type."));

    let named_raw = Endpoint::named("Api.m")
        .post("upload")
        .multipart()
        .param(Param::part("file").of_type::<courier_core::Part>())
        .returns_raw::<String>();
    assert!(compile_error(named_raw)
        .starts_with("Part parameters using the multipart Part type must not include a part name."));
}

// --- compiled descriptors ---

#[test]
fn compiled_descriptor_exposes_its_template() {
    let endpoint = Endpoint::named("GitHub.createIssue")
        .post("repos/{owner}/{repo}/issues")
        .headers(["Content-Type: application/json", "Accept: application/vnd.github.v3+json"])
        .param(Param::path("owner"))
        .param(Param::path("repo"))
        .param(Param::body_of::<serde_json::Value>())
        .returns_raw::<String>();
    let method = client().load(&endpoint).unwrap();

    assert_eq!(method.name(), "GitHub.createIssue");
    assert_eq!(method.http_method(), &HttpMethod::Post);
    assert_eq!(method.relative_url(), Some("repos/{owner}/{repo}/issues"));
    assert_eq!(method.content_type(), Some("application/json"));
    assert_eq!(method.parameter_count(), 3);
}

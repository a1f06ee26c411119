//! End-to-end render pass tests.
//!
//! Each test lays out a small project in a temporary directory and runs a
//! full pass through the public builder.

use std::{fs, path::Path};

use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;
use webdoc_core::{Config, UndefinedMode};
use webdoc_generator::{BuildError, Builder, Extensions, RecordType, RenderError, StructureNode};

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    for (name, body) in files {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }
    dir
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative))
        .unwrap_or_else(|e| panic!("read {relative}: {e}"))
}

fn read_json(root: &Path, relative: &str) -> JsonValue {
    serde_json::from_str(&read(root, relative)).expect("valid JSON")
}

fn render_error(err: BuildError) -> RenderError {
    match err {
        BuildError::Render(err) => err,
        other => panic!("expected render failure, got {other}"),
    }
}

#[test]
fn test_cross_reference_renders_owner_once() {
    // `index` sorts first, so `team` is first rendered through the lookup.
    let dir = project(&[
        (
            "template/team.jinja",
            "{% call fieldblock('name') %}\n  Team\n{% endcall %}<p>About</p>",
        ),
        (
            "template/index.jinja",
            "<h1>{{ get_field('team.jinja', 'name') }}</h1>",
        ),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let stats = builder.build().unwrap();

    assert_eq!(stats.pages, 2);
    assert_eq!(read(dir.path(), "render/document/index.html"), "<h1>Team</h1>");
    assert_eq!(read(dir.path(), "render/document/team.html"), "<p>About</p>");

    let documents = fs::read_dir(dir.path().join("render/document"))
        .unwrap()
        .count();
    assert_eq!(documents, 2);

    assert_eq!(
        read_json(dir.path(), "render/data/fields/team.json"),
        json!({"name": "\n  Team\n"})
    );
}

#[test]
fn test_missing_template_is_named() {
    let dir = project(&[(
        "template/home.jinja",
        "{{ get_field('missing', 'name') }}",
    )]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let err = render_error(builder.build().unwrap_err());

    assert!(matches!(
        err.root_cause(),
        RenderError::TemplateNotFound(id) if id.as_str() == "missing.jinja"
    ));
    assert_eq!(
        err.to_string(),
        "while rendering home.jinja: template not found: missing.jinja"
    );
}

#[test]
fn test_nested_failure_keeps_chain() {
    let dir = project(&[
        ("template/a.jinja", "{{ get_field('b', 'name') }}"),
        ("template/b.jinja", "{{ get_field('c', 'name') }}"),
        ("template/c.jinja", "{% call fieldblock('title') %}C{% endcall %}"),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let err = render_error(builder.build().unwrap_err());

    let chain: Vec<_> = err.chain().into_iter().map(|id| id.as_str()).collect();
    assert_eq!(chain, ["a.jinja", "b.jinja"]);
    assert!(err.to_string().starts_with(
        "while rendering a.jinja: while rendering b.jinja: template 'c.jinja' does not have field 'name'"
    ));
}

#[test]
fn test_mutual_lookup_without_fields_is_a_cycle() {
    let dir = project(&[
        ("template/a.jinja", "{{ get_field('b', 'name') }}"),
        ("template/b.jinja", "{{ get_field('a', 'name') }}"),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let err = render_error(builder.build().unwrap_err());

    assert!(matches!(err.root_cause(), RenderError::Cycle(id) if id.as_str() == "a.jinja"));
    assert!(!builder.is_rendering());
}

#[test]
fn test_mutual_lookup_with_recorded_fields() {
    let dir = project(&[
        (
            "template/a.jinja",
            "{% call fieldblock('name') %}A{% endcall %}[{{ get_field('b', 'name') }}]",
        ),
        (
            "template/b.jinja",
            "{% call fieldblock('name') %}B{% endcall %}[{{ get_field('a', 'name') }}]",
        ),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    builder.build().unwrap();

    assert_eq!(read(dir.path(), "render/document/a.html"), "[B]");
    assert_eq!(read(dir.path(), "render/document/b.html"), "[A]");
}

#[test]
fn test_data_sections_merge_and_export() {
    let dir = project(&[(
        "template/guides/about.jinja",
        "{% call datasection('meta') %}{{ data('title', 'X') }}{% endcall %}\
         {% call datasection('meta') %}{{ data('subtitle', 'Y') }}{% endcall %}\
         {% call datasection('people') %}{{ data('authors', as_array('Ada')) }}{% endcall %}",
    )]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let stats = builder.build().unwrap();

    assert_eq!(stats.objects, 3);
    assert_eq!(
        read_json(dir.path(), "render/data/objects/guides/about.json"),
        json!({
            "meta": {"title": "X", "subtitle": "Y"},
            "people": {"authors": ["Ada"]}
        })
    );
}

#[test]
fn test_data_outside_section_fails() {
    let dir = project(&[("template/about.jinja", "{{ data('title', 'X') }}")]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let err = render_error(builder.build().unwrap_err());

    assert!(matches!(err.root_cause(), RenderError::NoActiveSection { key } if key == "title"));
    assert!(!dir.path().join("render/data/objects").exists());
}

#[test]
fn test_undefined_value_is_rejected() {
    let dir = project(&[(
        "template/about.jinja",
        "{% call datasection('meta') %}{{ data('title', page_title) }}{% endcall %}",
    )]);
    let mut config = Config::default();
    config.render.undefined = UndefinedMode::Lenient;
    let builder = Builder::new(config, dir.path()).unwrap();

    let err = render_error(builder.build().unwrap_err());

    assert!(matches!(
        err.root_cause(),
        RenderError::UndefinedValue { section, key } if section == "meta" && key == "title"
    ));
}

#[test]
fn test_repeated_passes_are_identical() {
    let dir = project(&[
        ("template/index.jinja", "{% call fieldblock('name') %}Home{% endcall %}index"),
        ("template/guides/a.jinja", "{{ link_to('index') }}"),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let first = builder.build().unwrap();
    let link = read(dir.path(), "render/document/guides/a.html");
    let manifest = read(dir.path(), "render/data/structure.json");

    let second = builder.build().unwrap();

    assert_eq!(first.pages, second.pages);
    assert_eq!(first.fields, second.fields);
    assert_eq!(link, "<a href=\"/document/index.html\">Home</a>");
    assert_eq!(read(dir.path(), "render/document/guides/a.html"), link);
    assert_eq!(read(dir.path(), "render/data/structure.json"), manifest);
}

#[test]
fn test_module_templates_and_layouts() {
    let dir = project(&[
        (
            "modules/blog/template/base.jinja",
            "<main>{% block body %}{% endblock %}</main>",
        ),
        (
            "template/post.jinja",
            "{% extends '@blog/base.jinja' %}{% block body %}{{ style('@blog/post.css') }}{% endblock %}",
        ),
        ("template/modules/shared.jinja", "never a page"),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let stats = builder.build().unwrap();

    assert_eq!(stats.pages, 1);
    assert_eq!(
        read(dir.path(), "render/document/post.html"),
        "<main><link rel=\"stylesheet\" type=\"text/css\" href=\"/@blog/style/post.css\"></main>"
    );
    assert!(!dir.path().join("render/document/modules").exists());
}

#[test]
fn test_structure_manifest() {
    let dir = project(&[
        ("template/index.jinja", "{% call fieldblock('name') %}Home{% endcall %}"),
        ("template/guides/install.jinja", "install"),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    builder.build().unwrap();

    let manifest: StructureNode =
        serde_json::from_str(&read(dir.path(), "render/data/structure.json")).unwrap();
    assert_eq!(manifest.name(), "render");

    let document = manifest.child("document").expect("document dir");
    assert!(document.child("index.html").is_some());
    assert!(
        document
            .child("guides")
            .and_then(|guides| guides.child("install.html"))
            .is_some()
    );

    let data = manifest.child("data").expect("data dir");
    assert!(data.child("structure.json").is_none());
    assert!(
        data.child("fields")
            .and_then(|fields| fields.child("index.json"))
            .is_some()
    );
}

#[test]
fn test_spec_parameters() {
    let dir = project(&[("template/index.jinja", "{{ PARAMS.channel }}")]);
    let config: Config = toml::from_str(
        r#"
[params]
channel = "stable"

[specs.nightly]
channel = "nightly"
"#,
    )
    .unwrap();
    let builder = Builder::new(config, dir.path()).unwrap();

    builder.build().unwrap();
    assert_eq!(read(dir.path(), "render/document/index.html"), "stable");

    builder.build_with_spec(Some("nightly")).unwrap();
    assert_eq!(read(dir.path(), "render/document/index.html"), "nightly");
}

#[test]
fn test_record_types_export_type_tag() {
    let dir = project(&[(
        "template/team.jinja",
        "{% call datasection('people') %}{{ data('lead', Person(name='Ada', role='author')) }}{% endcall %}",
    )]);
    let builder = Builder::with_extensions(
        Config::default(),
        dir.path(),
        Extensions::builtin().with(RecordType::new("Person", ["name", "role"])),
    )
    .unwrap();

    builder.build().unwrap();

    assert_eq!(
        read_json(dir.path(), "render/data/objects/team.json"),
        json!({"people": {"lead": {"type": "Person", "name": "Ada", "role": "author"}}})
    );
}

#[test]
fn test_nested_render_keeps_data_with_its_template() {
    // `a` sorts first; its lookup renders `b` while `a` has a section open.
    let dir = project(&[
        (
            "template/a.jinja",
            "{% call datasection('meta') %}{{ data('x', 1) }}\
             [{{ get_field('b', 'name') }}]\
             {{ data('y', current_template()) }}{% endcall %}",
        ),
        (
            "template/b.jinja",
            "{% call fieldblock('name') %}B{% endcall %}\
             {% call datasection('meta') %}{{ data('z', current_template()) }}{% endcall %}",
        ),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let stats = builder.build().unwrap();

    assert_eq!(stats.pages, 2);
    assert_eq!(read(dir.path(), "render/document/a.html"), "[B]");
    assert_eq!(
        read_json(dir.path(), "render/data/objects/a.json"),
        json!({"meta": {"x": 1, "y": "a.jinja"}})
    );
    assert_eq!(
        read_json(dir.path(), "render/data/objects/b.json"),
        json!({"meta": {"z": "b.jinja"}})
    );
}

#[test]
fn test_wrapped_undefined_value_is_rejected() {
    let dir = project(&[(
        "template/about.jinja",
        "{% call datasection('meta') %}{{ data('authors', as_array(missing)) }}{% endcall %}",
    )]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let err = render_error(builder.build().unwrap_err());

    assert!(matches!(
        err.root_cause(),
        RenderError::UndefinedValue { section, key } if section == "meta" && key == "authors"
    ));
    assert!(!dir.path().join("render/data/objects").exists());
}

#[test]
fn test_undefined_map_value_is_rejected() {
    let dir = project(&[(
        "template/about.jinja",
        "{% call datasection('meta') %}{{ data('m', {'a': missing}) }}{% endcall %}",
    )]);
    let mut config = Config::default();
    config.render.undefined = UndefinedMode::Lenient;
    let builder = Builder::new(config, dir.path()).unwrap();

    let err = render_error(builder.build().unwrap_err());

    assert!(matches!(
        err.root_cause(),
        RenderError::UndefinedValue { key, .. } if key == "m"
    ));
}

#[test]
fn test_library_lookup_writes_no_document() {
    let dir = project(&[
        (
            "template/shared.lib.jinja",
            "{% call fieldblock('title') %}Shared{% endcall %}",
        ),
        (
            "template/index.jinja",
            "{{ get_field('shared.lib', 'title') }}",
        ),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    let stats = builder.build().unwrap();

    assert_eq!(stats.pages, 1);
    assert_eq!(read(dir.path(), "render/document/index.html"), "Shared");
    assert!(!dir.path().join("render/document/shared.lib.html").exists());
    assert_eq!(
        read_json(dir.path(), "render/data/fields/shared.lib.json"),
        json!({"title": "Shared"})
    );
}

#[test]
fn test_layout_field_overridden_by_child_block() {
    let dir = project(&[
        (
            "template/base.lib.jinja",
            "{% block name %}{% call fieldblock('name') %}Base{% endcall %}{% endblock %}\
             <main>{% block body %}{% endblock %}</main>",
        ),
        (
            "template/guide.jinja",
            "{% extends 'base.lib.jinja' %}\
             {% block name %}{% call fieldblock('name') %}Guide{% endcall %}{% endblock %}\
             {% block body %}g{% endblock %}",
        ),
        (
            "template/plain.jinja",
            "{% extends 'base.lib.jinja' %}{% block body %}p{% endblock %}",
        ),
    ]);
    let builder = Builder::new(Config::default(), dir.path()).unwrap();

    builder.build().unwrap();

    assert_eq!(read(dir.path(), "render/document/guide.html"), "<main>g</main>");
    assert_eq!(
        read_json(dir.path(), "render/data/fields/guide.json"),
        json!({"name": "Guide"})
    );
    assert_eq!(
        read_json(dir.path(), "render/data/fields/plain.json"),
        json!({"name": "Base"})
    );
}

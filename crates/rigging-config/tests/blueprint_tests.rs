//! End-to-end tests for loading, validating and planning a project tree.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use rigging_config::{
    Blueprint, ConfigError, EntryType, Kind, Mode, ObjectCollection, Options, PlaceholderError,
};
use serde_json::json;
use tempfile::TempDir;

const PROJECT: &str = r#"
apiVersion: g2a-cli/v2.0
kind: Project
name: shop
files:
  - executors.yaml
  - services/*/service.yaml
  - environments/*/environment.yaml
variables:
  registry: registry.example.com
"#;

const EXECUTORS: &str = r#"
apiVersion: g2a-cli/v2.0
kind: Builder
name: docker
schema:
  type: object
  required: [image]
script: docker build
---
apiVersion: g2a-cli/v2.0
kind: Builder
name: script
script: sh
---
apiVersion: g2a-cli/v2.0
kind: Pusher
name: docker
script: docker push
---
apiVersion: g2a-cli/v2.0
kind: Tagger
name: git
script: git describe
---
apiVersion: g2a-cli/v2.0
kind: Deployer
name: helm
schema:
  required: [chart]
script: helm upgrade
"#;

const API_SERVICE: &str = r#"
apiVersion: g2a-cli/v2.0
kind: Service
name: api
tags:
  - git: {}
artifacts:
  - docker:
      image: "{{ .Project.Vars.registry }}/{{ .Service.Name }}"
releases:
  - helm:
      chart: "{{ .Service.Dir }}/chart"
      replicas: "{{ .Environment.Vars.replicas }}"
      tag: "{{ .Tag }}"
"#;

const LEGACY_WEB_SERVICE: &str = r#"
apiVersion: g2a-cli/v1beta4
kind: Service
name: web
hooks:
  pre-build: [npm ci]
build:
  tagPolicy:
    git: {}
  artifacts:
    - docker:
        image: "{{ .Project.Vars.registry }}/web"
deploy:
  releases:
    - helm:
        chart: "{{ .Dirs.Service }}/chart"
"#;

const PROD: &str = r#"
apiVersion: g2a-cli/v2.0
kind: Environment
name: prod
deployServices: [api]
variables:
  replicas: "3"
"#;

const DEV: &str = r#"
apiVersion: g2a-cli/v2.0
kind: Environment
name: dev
variables:
  replicas: "1"
"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// A project with two services, two environments and every executor.
    fn shop() -> Self {
        let fixture = Self::new();
        fixture
            .write("project.yaml", PROJECT)
            .write("executors.yaml", EXECUTORS)
            .write("services/api/service.yaml", API_SERVICE)
            .write("services/web/service.yaml", LEGACY_WEB_SERVICE)
            .write("environments/prod/environment.yaml", PROD)
            .write("environments/dev/environment.yaml", DEV);
        fixture
    }

    fn write(&self, name: &str, content: &str) -> &Self {
        let path = self.dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        self
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn project_file(&self) -> String {
        self.path("project.yaml").display().to_string()
    }

    fn load(&self, mut blueprint: Blueprint, options: Options) -> Blueprint {
        blueprint.load(&self.project_file()).unwrap();
        blueprint.add_documents([options]).unwrap();
        blueprint
    }
}

fn service_names(blueprint: &Blueprint) -> Vec<&str> {
    blueprint.list_services().iter().map(|s| s.name()).collect()
}

fn errors(err: ConfigError) -> Vec<ConfigError> {
    match err {
        ConfigError::Multiple(list) => list.into_errors(),
        other => vec![other],
    }
}

#[test]
fn test_load_follows_project_globs() {
    let fixture = Fixture::shop();
    let blueprint = fixture.load(Blueprint::builder(Mode::Build).build().unwrap(), Options::new());

    assert_eq!(service_names(&blueprint), vec!["api", "web"]);
    assert_eq!(blueprint.get_project().unwrap().name(), "shop");
    assert!(blueprint.get_executor(Kind::Deployer, "helm").is_some());
    assert_eq!(blueprint.get_objects_by_kind(Kind::Builder).len(), 2);
    assert_eq!(
        blueprint.get_unique_object(Kind::Project).map(|p| p.name()),
        Some("shop")
    );
    assert!(blueprint.get_unique_object(Kind::Options).is_some());
}

#[test]
fn test_build_mode_skips_environments() {
    let fixture = Fixture::shop();
    let blueprint = fixture.load(Blueprint::builder(Mode::Build).build().unwrap(), Options::new());

    assert!(blueprint.get_environment("prod").is_none());
    assert!(blueprint.get_objects_by_kind(Kind::Environment).is_empty());
}

#[test]
fn test_build_plan_resolves_specs() {
    let fixture = Fixture::shop();
    let blueprint = fixture.load(Blueprint::builder(Mode::Build).build().unwrap(), Options::new());

    blueprint.validate().unwrap();
    let plan = blueprint
        .plan(&[EntryType::Tag, EntryType::Build, EntryType::Push])
        .unwrap();

    assert_eq!(plan.environment, None);
    let api = &plan.services[0];
    assert_eq!(api.name, "api");
    assert_eq!(api.phases.len(), 3);
    assert_eq!(api.phases[1].phase, EntryType::Build);
    assert_eq!(
        api.phases[1].entries[0].spec,
        json!({ "image": "registry.example.com/api" })
    );
    assert_eq!(api.phases[1].entries[0].executor_file, fixture.path("executors.yaml"));
}

#[test]
fn test_legacy_service_is_migrated_on_load() {
    let fixture = Fixture::shop();
    let blueprint = fixture.load(Blueprint::builder(Mode::Build).build().unwrap(), Options::new());

    let plan = blueprint.plan(&[EntryType::Build, EntryType::Push]).unwrap();
    let web = &plan.services[1];

    let build = &web.phases[0].entries;
    assert_eq!(build.len(), 2);
    assert_eq!(build[0].executor_name, "script");
    assert_eq!(build[0].spec, json!({ "sh": "set -e\nnpm ci\n" }));
    assert_eq!(build[1].index, 1);
    assert_eq!(build[1].spec, json!({ "image": "registry.example.com/web" }));

    let push = &web.phases[1].entries;
    assert_eq!(push.len(), 1);
    assert_eq!(push[0].index, 1);
    assert_eq!(push[0].executor_kind, "pusher");
}

#[test]
fn test_deploy_plan_uses_environment_services() {
    let fixture = Fixture::shop();
    let blueprint = fixture.load(
        Blueprint::builder(Mode::Deploy).environment("prod").build().unwrap(),
        Options::new().with_tag("1.0.0"),
    );

    blueprint.validate().unwrap();
    let plan = blueprint.plan(&[EntryType::Deploy]).unwrap();

    assert_eq!(plan.environment.as_deref(), Some("prod"));
    assert_eq!(plan.services.len(), 1);
    assert_eq!(
        plan.services[0].phases[0].entries[0].spec,
        json!({
            "chart": format!("{}/chart", fixture.path("services/api").display()),
            "replicas": "3",
            "tag": "1.0.0",
        })
    );
}

#[test]
fn test_explicit_services_take_precedence() {
    let fixture = Fixture::shop();
    let blueprint = fixture.load(
        Blueprint::builder(Mode::Deploy)
            .environment("prod")
            .services(["web"])
            .build()
            .unwrap(),
        Options::new().with_tag("1.0.0"),
    );

    assert_eq!(service_names(&blueprint), vec!["web"]);

    let plan = blueprint.plan(&[EntryType::Deploy]).unwrap();
    assert_eq!(
        plan.services[0].phases[0].entries[0].spec,
        json!({ "chart": format!("{}/chart", fixture.path("services/web").display()) })
    );
}

#[test]
fn test_environment_without_deploy_services_deploys_everything() {
    let fixture = Fixture::shop();
    let blueprint = fixture.load(
        Blueprint::builder(Mode::Deploy).environment("dev").build().unwrap(),
        Options::new().with_tag("1.0.0"),
    );

    assert_eq!(service_names(&blueprint), vec!["api", "web"]);
}

#[test]
fn test_validation_collects_every_error() {
    let fixture = Fixture::shop();
    fixture
        .write(
            "environments/prod/environment.yaml",
            "apiVersion: g2a-cli/v2.0\nkind: Environment\nname: prod\ndeployServices: [api, billing]\n",
        )
        .write(
            "services/api/service.yaml",
            "apiVersion: g2a-cli/v2.0\nkind: Service\nname: api\nreleases:\n  - helm: {}\n  - kubectl: {}\n",
        );
    let blueprint = fixture.load(
        Blueprint::builder(Mode::Deploy)
            .environment("prod")
            .services(["api", "missing"])
            .build()
            .unwrap(),
        Options::new(),
    );

    let errors = errors(blueprint.validate().unwrap_err());

    assert_eq!(errors.len(), 4, "{errors:#?}");
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownDeployService { service, .. } if service == "billing"
    )));
    assert!(errors.iter().any(|e| matches!(e, ConfigError::SchemaViolation { .. })));
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::MissingExecutor { kind: Kind::Deployer, name, .. } if name == "kubectl"
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::MissingObject { kind: Kind::Service, name, available }
            if name == "missing" && available == &["api", "web"]
    )));
}

#[test]
fn test_missing_options_and_project_are_reported_once() {
    let fixture = Fixture::new();
    fixture
        .write("project.yaml", "apiVersion: g2a-cli/v2.0\nkind: Tagger\nname: git\n")
        .write(
            "service.yaml",
            "apiVersion: g2a-cli/v2.0\nkind: Service\nname: api\ntags:\n  - git: {}\n",
        );
    let mut blueprint = Blueprint::builder(Mode::Build).build().unwrap();
    blueprint.load(&fixture.path("*.yaml").display().to_string()).unwrap();

    let errors = errors(blueprint.validate().unwrap_err());

    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], ConfigError::MissingSingleton(Kind::Project)));
    assert!(matches!(errors[1], ConfigError::MissingSingleton(Kind::Options)));
}

#[test]
fn test_placeholder_cycle_is_a_resolution_error() {
    let fixture = Fixture::shop();
    fixture.write(
        "environments/prod/environment.yaml",
        "apiVersion: g2a-cli/v2.0\nkind: Environment\nname: prod\ndeployServices: [api]\nvariables:\n  replicas: \"{{ .Environment.Vars.replicas }}\"\n",
    );
    let blueprint = fixture.load(
        Blueprint::builder(Mode::Deploy).environment("prod").build().unwrap(),
        Options::new().with_tag("1.0.0"),
    );

    let errors = errors(blueprint.plan(&[EntryType::Deploy]).unwrap_err());

    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::Resolution { source, phase, .. } => {
            assert_eq!(phase, "deploy");
            assert!(matches!(
                **source,
                ConfigError::Placeholder(PlaceholderError::Cyclic { ref cycle })
                    if cycle.len() == 2
            ));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_duplicate_objects_across_files() {
    let fixture = Fixture::shop();
    fixture.write(
        "services/copy/service.yaml",
        "apiVersion: g2a-cli/v2.0\nkind: Service\nname: api\n",
    );
    let mut blueprint = Blueprint::builder(Mode::Build).build().unwrap();

    let err = blueprint.load(&fixture.project_file()).unwrap_err();

    match err {
        ConfigError::DuplicateObject(name, first, second) => {
            assert_eq!(name, "service \"api\"");
            assert_eq!(first.filename(), fixture.path("services/api/service.yaml"));
            assert_eq!(second.filename(), fixture.path("services/copy/service.yaml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_each_file_is_read_once() {
    let fixture = Fixture::new();
    fixture
        .write(
            "project.yaml",
            "apiVersion: g2a-cli/v2.0\nkind: Project\nname: loop\nfiles: ['*.yaml', 'project.yaml', 'tagger.yaml']\n",
        )
        .write("tagger.yaml", "apiVersion: g2a-cli/v2.0\nkind: Tagger\nname: git\n");
    let mut blueprint = Blueprint::builder(Mode::Build).build().unwrap();

    blueprint.load(&fixture.project_file()).unwrap();
    blueprint.load(&fixture.project_file()).unwrap();

    assert_eq!(blueprint.get_objects_by_kind(Kind::Tagger).len(), 1);
}

#[test]
fn test_load_error_names_file_and_line() {
    let fixture = Fixture::new();
    fixture.write(
        "project.yaml",
        "apiVersion: g2a-cli/v2.0\nkind: Project\nname: p\nfiles: [bad.yaml]\n",
    );
    fixture.write("bad.yaml", "# header\n\napiVersion: g2a-cli/v2.0\nkind: Service\n");
    let mut blueprint = Blueprint::builder(Mode::Build).build().unwrap();

    let err = blueprint.load(&fixture.project_file()).unwrap_err();

    assert_eq!(
        err.to_string(),
        format!(
            "file \"{}:3\" contains invalid document: document does not match the service schema:\n\t  \"name\" is a required property",
            fixture.path("bad.yaml").display()
        )
    );
}

#[test]
fn test_legacy_project_is_migrated() {
    let fixture = Fixture::new();
    fixture
        .write("project.yaml", "apiVersion: g2a-cli/v1beta4\nkind: Project\nservices: [./]\n")
        .write(
            "service.yaml",
            "apiVersion: g2a-cli/v1beta4\nkind: Service\nname: solo\nbuild:\n  tagPolicy:\n    git: {}\n",
        );
    let mut blueprint = Blueprint::builder(Mode::Build).build().unwrap();

    blueprint.load(&fixture.project_file()).unwrap();

    assert_eq!(blueprint.get_project().unwrap().name(), "project");
    assert_eq!(service_names(&blueprint), vec!["solo"]);
    let solo = blueprint.list_services()[0];
    assert_eq!(solo.entries(EntryType::Tag).len(), 1);
    assert!(solo.entries(EntryType::Build).is_empty());
}

#[test]
fn test_parent_relative_globs_do_not_reread_files() {
    let fixture = Fixture::new();
    fixture
        .write(
            "repo/project.yaml",
            "apiVersion: g2a-cli/v2.0\nkind: Project\nname: p\nfiles: ['../repo/*.yaml', './tagger.yaml']\n",
        )
        .write(
            "repo/tagger.yaml",
            "apiVersion: g2a-cli/v2.0\nkind: Tagger\nname: git\n",
        );
    let mut blueprint = Blueprint::builder(Mode::Build).build().unwrap();

    blueprint
        .load(&fixture.path("repo/project.yaml").display().to_string())
        .unwrap();

    assert_eq!(blueprint.get_project().unwrap().name(), "p");
    assert_eq!(blueprint.get_objects_by_kind(Kind::Tagger).len(), 1);
}

#[test]
fn test_missing_executors_reported_with_unknown_environment() {
    let fixture = Fixture::shop();
    fixture.write(
        "services/api/service.yaml",
        "apiVersion: g2a-cli/v2.0\nkind: Service\nname: api\nreleases:\n  - kubectl: {}\n",
    );
    let blueprint = fixture.load(
        Blueprint::builder(Mode::Deploy).environment("qa").build().unwrap(),
        Options::new(),
    );

    let errors = errors(blueprint.validate().unwrap_err());

    assert_eq!(errors.len(), 2, "{errors:#?}");
    assert!(matches!(
        &errors[0],
        ConfigError::MissingObject { kind: Kind::Environment, name, available }
            if name == "qa" && available == &["dev", "prod"]
    ));
    assert!(matches!(
        &errors[1],
        ConfigError::MissingExecutor { kind: Kind::Deployer, name, .. } if name == "kubectl"
    ));
}

#[test]
fn test_invalid_project_glob_names_the_project() {
    let fixture = Fixture::new();
    fixture.write(
        "project.yaml",
        "apiVersion: g2a-cli/v2.0\nkind: Project\nname: p\nfiles: ['[a']\n",
    );
    let mut blueprint = Blueprint::builder(Mode::Build).build().unwrap();

    let err = blueprint.load(&fixture.project_file()).unwrap_err();

    match err {
        ConfigError::Load { origin, source } => {
            assert_eq!(origin.filename(), fixture.path("project.yaml"));
            assert_eq!(origin.line(), Some(1));
            assert!(matches!(*source, ConfigError::Glob { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

//! Behaviour-driven step definitions driving the extract CLI scenarios.

use super::helpers::{LayerOverrides, Workspace, merge_layers};
use super::*;
use crate::extract::{ExtractConfig, resolve_extract_config};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

/// Extract CLI scenario state shared by every step through one world
/// argument.
#[derive(Debug)]
struct ExtractWorld {
    workspace: Workspace,
    cli_args: RefCell<Vec<String>>,
    cli_result: RefCell<Option<Result<ExtractConfig, CliError>>>,
    config_layer: RefCell<Option<LayerOverrides>>,
    env_layer: RefCell<Option<LayerOverrides>>,
}

impl ExtractWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            cli_args: RefCell::new(Vec::new()),
            cli_result: RefCell::new(None),
            config_layer: RefCell::new(None),
            env_layer: RefCell::new(None),
        }
    }

    fn push_flag(&self, flag: &str, value: &Utf8Path) {
        self.cli_args
            .borrow_mut()
            .extend([format!("--{flag}"), value.as_str().to_owned()]);
    }

    fn config(&self) -> std::cell::Ref<'_, ExtractConfig> {
        std::cell::Ref::map(self.cli_result.borrow(), |result| {
            result
                .as_ref()
                .expect("result recorded")
                .as_ref()
                .expect("expected success")
        })
    }
}

#[fixture]
fn world() -> ExtractWorld {
    ExtractWorld::new()
}

#[given("input files exist on disk")]
fn inputs_exist(#[from(world)] world: &ExtractWorld) {
    assert!(world.workspace.osm().as_std_path().is_file());
    assert!(world.workspace.polygons().as_std_path().is_file());
}

#[given("I pass the input and output paths with CLI flags")]
fn cli_provides_paths(#[from(world)] world: &ExtractWorld) {
    let workspace = &world.workspace;
    world.push_flag(ARG_OSM_PBF, &workspace.osm());
    world.push_flag(ARG_POLYGONS, &workspace.polygons());
    world.push_flag(ARG_OUTPUT, &workspace.output());
    world.push_flag(ARG_WORK_DIR, &workspace.work_dir());
}

#[given("I omit all extract configuration")]
fn omit_configuration(#[from(world)] world: &ExtractWorld) {
    world.cli_args.borrow_mut().clear();
    *world.config_layer.borrow_mut() = None;
    *world.env_layer.borrow_mut() = None;
}

#[given("the input and output paths are provided via a config file")]
fn provided_via_config(#[from(world)] world: &ExtractWorld) {
    let workspace = &world.workspace;
    *world.config_layer.borrow_mut() = Some(LayerOverrides {
        osm_pbf: Some(workspace.path("config.osm.pbf")),
        polygons: Some(workspace.polygons()),
        output: Some(workspace.output()),
    });
}

#[given("the polygon path is overridden via environment variables")]
fn polygons_overridden_by_env(#[from(world)] world: &ExtractWorld) {
    *world.env_layer.borrow_mut() = Some(LayerOverrides {
        polygons: Some(world.workspace.path("env.geojson")),
        ..LayerOverrides::default()
    });
}

#[given("I pass only the OSM CLI flag")]
fn cli_only_osm(#[from(world)] world: &ExtractWorld) {
    world.push_flag(ARG_OSM_PBF, &world.workspace.osm());
}

#[when("I configure the extract command")]
fn configure_extract(#[from(world)] world: &ExtractWorld) {
    let mut invocation = vec!["polyfeat".to_owned(), "extract".to_owned()];
    invocation.extend(world.cli_args.borrow().iter().cloned());
    let file_layer = world.config_layer.borrow().clone();
    let env_layer = world.env_layer.borrow().clone();
    let outcome = Cli::try_parse_from(invocation)
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| match cli.command {
            Command::Extract(args) => {
                if file_layer.is_some() || env_layer.is_some() {
                    merge_layers(args, file_layer.as_ref(), env_layer.as_ref())
                } else {
                    resolve_extract_config(args)
                }
            }
            Command::Analyze(_) => panic!("expected the extract command"),
        });
    world.cli_result.replace(Some(outcome));
}

#[then("the extract plan uses the CLI-provided paths")]
fn plan_uses_cli_paths(#[from(world)] world: &ExtractWorld) {
    let config = world.config();
    assert_eq!(config.osm_pbf, world.workspace.osm());
    assert_eq!(config.polygons, Some(world.workspace.polygons()));
    assert_eq!(config.output, world.workspace.output());
    assert_eq!(config.work_dir, world.workspace.work_dir());
}

#[then("the CLI reports that the \"osm-pbf\" flag is missing")]
fn reports_missing_osm(#[from(world)] world: &ExtractWorld) {
    let borrowed = world.cli_result.borrow();
    let error = borrowed
        .as_ref()
        .expect("result recorded")
        .as_ref()
        .expect_err("expected error");
    match error {
        CliError::MissingArgument { field, .. } => assert_eq!(*field, ARG_OSM_PBF),
        other => panic!("unexpected error {other:?}"),
    }
}

#[then("CLI and environment layers override configuration defaults")]
fn precedence_holds(#[from(world)] world: &ExtractWorld) {
    let config = world.config();
    assert_eq!(config.osm_pbf, world.workspace.osm());
    assert_eq!(config.polygons, Some(world.workspace.path("env.geojson")));
    assert_eq!(config.output, world.workspace.output());
}

macro_rules! register_extract_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/extract_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: ExtractWorld) {
            let _ = world;
        }
    };
}

register_extract_scenario!(cli_flag_selection, "selecting input paths via CLI flags");
register_extract_scenario!(rejecting_missing_args, "rejecting missing arguments");
register_extract_scenario!(
    layering_cli_config_env,
    "layering CLI, config file, and environment values"
);

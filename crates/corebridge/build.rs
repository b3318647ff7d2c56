use std::{
    env,
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

const CORES_ENV: &str = "COREBRIDGE_STATIC_CORES";
const LIB_DIR_ENV: &str = "COREBRIDGE_STATIC_LIB_DIR";

/// Every entry point a prefixed static core exports: (table field, symbol, signature).
const ENTRY_POINTS: &[(&str, &str, &str)] = &[
    ("init", "retro_init", "()"),
    ("deinit", "retro_deinit", "()"),
    ("api_version", "retro_api_version", "() -> c_uint"),
    ("get_system_info", "retro_get_system_info", "(info: *mut retro_system_info)"),
    ("get_system_av_info", "retro_get_system_av_info", "(info: *mut retro_system_av_info)"),
    ("set_environment", "retro_set_environment", "(cb: retro_environment_t)"),
    ("set_video_refresh", "retro_set_video_refresh", "(cb: retro_video_refresh_t)"),
    ("set_audio_sample", "retro_set_audio_sample", "(cb: retro_audio_sample_t)"),
    ("set_audio_sample_batch", "retro_set_audio_sample_batch", "(cb: retro_audio_sample_batch_t)"),
    ("set_input_poll", "retro_set_input_poll", "(cb: retro_input_poll_t)"),
    ("set_input_state", "retro_set_input_state", "(cb: retro_input_state_t)"),
    ("set_controller_port_device", "retro_set_controller_port_device", "(port: c_uint, device: c_uint)"),
    ("reset", "retro_reset", "()"),
    ("run", "retro_run", "()"),
    ("load_game", "retro_load_game", "(game: *const retro_game_info) -> bool"),
    (
        "load_game_special",
        "retro_load_game_special",
        "(game_type: c_uint, info: *const retro_game_info, num_info: usize) -> bool",
    ),
    ("unload_game", "retro_unload_game", "()"),
    ("get_region", "retro_get_region", "() -> c_uint"),
    ("serialize_size", "retro_serialize_size", "() -> usize"),
    ("serialize", "retro_serialize", "(data: *mut c_void, size: usize) -> bool"),
    ("unserialize", "retro_unserialize", "(data: *const c_void, size: usize) -> bool"),
    ("get_memory_data", "retro_get_memory_data", "(id: c_uint) -> *mut c_void"),
    ("get_memory_size", "retro_get_memory_size", "(id: c_uint) -> usize"),
    ("cheat_reset", "retro_cheat_reset", "()"),
    ("cheat_set", "retro_cheat_set", "(index: c_uint, enabled: bool, code: *const c_char)"),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=vendor/libretro.h");
    println!("cargo:rerun-if-env-changed={CORES_ENV}");
    println!("cargo:rerun-if-env-changed={LIB_DIR_ENV}");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is not set"));
    let manifest_dir =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is not set"));

    generate_bindings(
        &manifest_dir.join("vendor/libretro.h"),
        &out_dir.join("libretro_bindings.rs"),
    );
    write_generated(&out_dir.join("entry_points.rs"), &entry_point_types());

    let prefixes = static_core_prefixes();

    if !prefixes.is_empty() {
        if let Some(dir) = env::var_os(LIB_DIR_ENV) {
            println!("cargo:rustc-link-search=native={}", Path::new(&dir).display());
        }
        for prefix in &prefixes {
            println!("cargo:rustc-link-lib=static={prefix}_libretro");
        }
    }

    write_generated(&out_dir.join("static_cores.rs"), &static_cores(&prefixes));
}

fn write_generated(path: &Path, source: &str) {
    fs::write(path, source)
        .unwrap_or_else(|err| panic!("failed to write {}: {err}", path.display()));
}

fn generate_bindings(header: &Path, output: &Path) {
    let mut builder = bindgen::Builder::default()
        .header(header.to_string_lossy())
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate_comments(false)
        .allowlist_type("retro_.*")
        .allowlist_var("RETRO_.*")
        .layout_tests(false)
        .derive_copy(true)
        .derive_debug(true)
        .derive_default(true);

    if cfg!(target_os = "windows") {
        builder = builder.clang_arg("-D_CRT_SECURE_NO_WARNINGS");
    }

    let bindings = builder
        .generate()
        .expect("bindgen failed to produce libretro bindings");

    fs::write(output, bindings.to_string())
        .unwrap_or_else(|err| panic!("failed to write bindings to {}: {err}", output.display()));
}

/// `libretro.h` declares the entry points as functions; the host needs them as
/// pointer types (`retro_init_fn`, ...) to fill a table from a module or a prefix.
fn entry_point_types() -> String {
    let mut out = String::from("// Generated by build.rs from ENTRY_POINTS.\n\n");
    out.push_str("use ::std::ffi::{c_char, c_uint, c_void};\n\n");
    for (_, symbol, signature) in ENTRY_POINTS {
        writeln!(out, "pub type {symbol}_fn = unsafe extern \"C\" fn{signature};").unwrap();
    }
    out
}

fn static_core_prefixes() -> Vec<String> {
    let Ok(list) = env::var(CORES_ENV) else {
        return Vec::new();
    };

    let mut prefixes: Vec<String> = Vec::new();
    for prefix in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        assert!(
            prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !prefix.starts_with(|c: char| c.is_ascii_digit()),
            "{CORES_ENV}: `{prefix}` is not a valid symbol prefix"
        );
        if !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_string());
        }
    }
    prefixes
}

fn static_cores(prefixes: &[String]) -> String {
    let mut out = String::from("// Generated by build.rs from COREBRIDGE_STATIC_CORES.\n\n");

    for prefix in prefixes {
        writeln!(out, "mod {prefix} {{").unwrap();
        out.push_str("    #[allow(unused_imports)]\n");
        out.push_str("    use std::ffi::{c_char, c_uint, c_void};\n");
        out.push_str("    use crate::raw::*;\n\n");
        out.push_str("    unsafe extern \"C\" {\n");
        for (_, symbol, signature) in ENTRY_POINTS {
            let (args, ret) = match signature.split_once(" -> ") {
                Some((args, ret)) => (args, format!(" -> {ret}")),
                None => (*signature, String::new()),
            };
            writeln!(out, "        #[link_name = \"{prefix}_{symbol}\"]").unwrap();
            writeln!(out, "        pub fn {symbol}{args}{ret};").unwrap();
        }
        out.push_str("    }\n}\n\n");
    }

    out.push_str(
        "pub(crate) fn builtin_cores() -> Vec<(&'static str, crate::table::CoreInterfaceTable)> {\n",
    );
    if prefixes.is_empty() {
        out.push_str("    Vec::new()\n");
    } else {
        out.push_str("    vec![\n");
        for prefix in prefixes {
            writeln!(out, "        (\"{prefix}\", crate::table::CoreInterfaceTable {{").unwrap();
            for (field, symbol, _) in ENTRY_POINTS {
                writeln!(out, "            {field}: Some({prefix}::{symbol}),").unwrap();
            }
            out.push_str("        }),\n");
        }
        out.push_str("    ]\n");
    }
    out.push_str("}\n");
    out
}

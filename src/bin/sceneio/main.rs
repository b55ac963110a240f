//! sceneio - Tool for inspecting and rewriting scene object containers.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::path::Path;
use std::process;

use serde_json::{json, Map, Value};
use tracing::{debug, info, trace};
use tracing_subscriber::EnvFilter;

use scene_object::io::EntryType;
use scene_object::prelude::*;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            "-V" | "--version" => {
                print_version();
                return;
            }
            _ => filtered_args.push(arg),
        }
    }

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let json_mode = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
    if json_mode {
        level = "error";
    }
    filtered_args.retain(|&s| s != "--json" && s != "-j");
    init_logging(level);

    match filtered_args[0] {
        // Info command - object summary
        "info" | "i" => {
            require_args(&filtered_args, 2, "sceneio info <file>");
            cmd_info(filtered_args[1]);
        }

        // Tree command - raw container layout
        "tree" | "t" => {
            require_args(&filtered_args, 2, "sceneio tree <file>");
            cmd_tree(filtered_args[1]);
        }

        // Hash command - structural hashes
        "hash" | "h" => {
            require_args(&filtered_args, 2, "sceneio hash <file> [name]");
            cmd_hash(filtered_args[1], filtered_args.get(2).copied());
        }

        // Dump command - object graph as text or JSON
        "dump" | "d" => {
            require_args(&filtered_args, 2, "sceneio dump <file> [name] [--json]");
            cmd_dump(filtered_args[1], filtered_args.get(2).copied(), json_mode);
        }

        // Copy command - load and re-save every object
        "copy" | "c" => {
            require_args(&filtered_args, 3, "sceneio copy <input> <output>");
            cmd_copy(filtered_args[1], filtered_args[2]);
        }

        // Render command - replay renderables through a recording renderer
        "render" | "r" => {
            require_args(&filtered_args, 2, "sceneio render <file> [name]");
            cmd_render(filtered_args[1], filtered_args.get(2).copied());
        }

        // Demo command - write a small sample scene
        "demo" => {
            require_args(&filtered_args, 2, "sceneio demo <output>");
            cmd_demo(filtered_args[1]);
        }

        "help" | "-h" | "--help" => print_help(),

        // Default: if file exists, show info; otherwise error
        _ => {
            if Path::new(filtered_args[0]).exists() {
                cmd_info(filtered_args[0]);
            } else {
                eprintln!("Unknown command: {}", filtered_args[0]);
                eprintln!();
                print_help();
                process::exit(1);
            }
        }
    }
}

fn require_args(args: &[&str], count: usize, usage: &str) {
    if args.len() < count {
        eprintln!("Error: missing arguments");
        eprintln!("Usage: {}", usage);
        process::exit(1);
    }
}

fn print_version() {
    println!(
        "sceneio {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("SCENEIO_BUILD_DATE"),
        env!("SCENEIO_BUILD_TIME")
    );
}

fn print_help() {
    println!("sceneio - scene object container toolkit");
    println!();
    println!("USAGE:");
    println!("    sceneio [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info   <file>                Show stored objects, types and sizes");
    println!("    t, tree   <file>                Show raw container entries");
    println!("    h, hash   <file> [name]         Print structural hashes");
    println!("    d, dump   <file> [name]         Dump object graphs (--json for JSON)");
    println!("    c, copy   <in> <out>            Load every object and save it again");
    println!("    r, render <file> [name]         Print the renderer calls of renderables");
    println!("    demo      <out>                 Write a small sample scene");
    println!("    help                            Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!("    -j, --json       JSON output for dump");
    println!("    -V, --version    Show version and build date");
    println!();
    println!("EXAMPLES:");
    println!("    sceneio demo scene.sob               # Write a sample file");
    println!("    sceneio info scene.sob               # Quick overview");
    println!("    sceneio dump scene.sob scene --json  # Export one object as JSON");
    println!("    sceneio copy in.sob out.sob          # Test round-trip");
    println!();
    println!("NOTES:");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn open_or_exit(path: &str, mode: OpenMode) -> IndexedIoPtr {
    info!("Opening container: {}", path);
    match FileIndexedIo::open(path, mode) {
        Ok(io) => io,
        Err(e) => {
            eprintln!("Failed to open {}: {}", path, e);
            process::exit(1);
        }
    }
}

fn load_or_exit(io: &IndexedIoPtr, name: &str) -> ObjectPtr {
    match ObjectPtr::load(io, name) {
        Ok(object) => object,
        Err(e) => {
            eprintln!("Failed to load {}: {}", name, e);
            process::exit(1);
        }
    }
}

/// Names of the objects stored at the container root.
fn object_names(io: &IndexedIoPtr) -> Vec<InternedString> {
    io.entry_ids_of_type(EntryType::Directory)
        .into_iter()
        .filter(|name| io.subdirectory(name).map(|d| d.has_entry("type")).unwrap_or(false))
        .collect()
}

/// Selected object names, or every stored object.
fn selected_names(io: &IndexedIoPtr, name: Option<&str>) -> Vec<InternedString> {
    match name {
        Some(n) => vec![InternedString::new(n)],
        None => object_names(io),
    }
}

/// Owned sub-objects with display names.
fn children(object: &ObjectPtr) -> Vec<(String, ObjectPtr)> {
    let guard = object.read();
    let mut out = Vec::new();
    if let Some(c) = guard.downcast_ref::<CompoundObject>() {
        out.extend(c.iter().map(|(k, v)| (k.to_string(), v.clone())));
    } else if let Some(v) = guard.downcast_ref::<ObjectVector>() {
        for (i, m) in v.members().iter().enumerate() {
            if let Some(m) = m {
                out.push((i.to_string(), m.clone()));
            }
        }
    } else if let Some(m) = guard.downcast_ref::<ObjectMatrix>() {
        let cols = m.cols().max(1);
        for (i, member) in m.members().iter().enumerate() {
            if let Some(member) = member {
                out.push((format!("{},{}", i / cols, i % cols), member.clone()));
            }
        }
    } else if let Some(g) = guard.downcast_ref::<Group>() {
        if let Some(t) = g.transform() {
            out.push(("transform".to_string(), t.clone()));
        }
        for (i, s) in g.state().iter().enumerate() {
            out.push((format!("state/{}", i), s.clone()));
        }
        for (i, c) in g.children().iter().enumerate() {
            out.push((format!("children/{}", i), c.clone()));
        }
    } else if let Some(a) = guard.downcast_ref::<AttributeState>() {
        out.extend(a.attributes().iter().map(|(k, v)| (k.to_string(), v.clone())));
    } else if let Some(p) = guard.as_primitive() {
        for (name, var) in p.variables() {
            if let Some(data) = &var.data {
                out.push((name.clone(), data.clone()));
            }
            if let Some(indices) = &var.indices {
                out.push((format!("{}.indices", name), indices.clone()));
            }
        }
    }
    out
}

/// Count unique objects in a graph by type name.
fn count_types(object: &ObjectPtr, seen: &mut HashSet<usize>, counts: &mut BTreeMap<&'static str, usize>) {
    if !seen.insert(object.addr()) {
        return;
    }
    *counts.entry(object.type_name()).or_default() += 1;
    for (_, child) in children(object) {
        count_types(&child, seen, counts);
    }
}

fn cmd_info(path: &str) {
    let io = open_or_exit(path, OpenMode::Read);
    let names = object_names(&io);
    debug!("Found {} stored objects", names.len());

    println!("Container: {}", path);
    println!();

    let mut seen = HashSet::new();
    let mut counts = BTreeMap::new();
    for name in &names {
        let object = load_or_exit(&io, name);
        println!(
            "  {:<20} {:<20} {:>10} bytes  {}",
            name.as_str(),
            object.type_name(),
            object.memory_usage(),
            object.hash()
        );
        count_types(&object, &mut seen, &mut counts);
    }
    debug!("{} interned names", InternedString::num_unique_strings());

    println!();
    println!("Objects by type:");
    for (type_name, count) in &counts {
        println!("  {:<24} {}", type_name, count);
    }
    println!();
    println!("Total unique objects: {}", seen.len());
}

fn print_entries(dir: &IndexedIoPtr, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    for name in dir.entry_ids() {
        let entry = dir.entry(&name)?;
        if entry.is_directory() {
            println!("{}{}/", indent, name);
            print_entries(&dir.subdirectory(&name)?, depth + 1)?;
            continue;
        }
        let data_type = entry.data_type.map(|t| t.to_string()).unwrap_or_default();
        match entry.array_length {
            Some(n) => println!("{}{}: {}[{}]", indent, name, data_type, n),
            None => println!("{}{}: {}", indent, name, data_type),
        }
    }
    Ok(())
}

fn cmd_tree(path: &str) {
    let io = open_or_exit(path, OpenMode::Read);
    println!("Container: {}", path);
    println!();
    if let Err(e) = print_entries(&io, 0) {
        eprintln!("Failed to read {}: {}", path, e);
        process::exit(1);
    }
}

fn cmd_hash(path: &str, name: Option<&str>) {
    let io = open_or_exit(path, OpenMode::Read);
    for name in selected_names(&io, name) {
        let object = load_or_exit(&io, &name);
        println!("{}  {}", object.hash(), name);
    }
}

fn to_json(object: &ObjectPtr) -> Value {
    let mut map = Map::new();
    {
        let guard = object.read();
        map.insert("type".to_string(), json!(guard.type_name()));
        if let Some(data) = guard.as_data() {
            map.insert("value".to_string(), data.to_json());
            return Value::Object(map);
        }
        if let Some(p) = guard.as_primitive() {
            let interpolations: Map<String, Value> = p
                .variables()
                .iter()
                .map(|(n, v)| (n.clone(), json!(v.interpolation.as_str())))
                .collect();
            map.insert("interpolation".to_string(), Value::Object(interpolations));
        }
    }

    let members: Map<String, Value> = children(object)
        .iter()
        .map(|(n, c)| (n.clone(), to_json(c)))
        .collect();
    if !members.is_empty() {
        map.insert("members".to_string(), Value::Object(members));
    }
    Value::Object(map)
}

fn print_object(name: &str, object: &ObjectPtr, depth: usize) {
    let indent = "  ".repeat(depth);
    let guard = object.read();
    match guard.as_data() {
        Some(data) => match data.array_len() {
            Some(n) => println!("{}{}: {} [{} elements]", indent, name, guard.type_name(), n),
            None => println!("{}{}: {} = {}", indent, name, guard.type_name(), data.to_json()),
        },
        None => println!("{}{}: {}", indent, name, guard.type_name()),
    }
    drop(guard);
    for (child_name, child) in children(object) {
        print_object(&child_name, &child, depth + 1);
    }
}

fn cmd_dump(path: &str, name: Option<&str>, json_mode: bool) {
    let io = open_or_exit(path, OpenMode::Read);
    let names = selected_names(&io, name);

    if json_mode {
        let mut out = Map::new();
        for name in &names {
            out.insert(name.to_string(), to_json(&load_or_exit(&io, name)));
        }
        match serde_json::to_string_pretty(&Value::Object(out)) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Failed to format JSON: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    for name in &names {
        let object = load_or_exit(&io, name);
        print_object(name, &object, 0);
    }
}

fn cmd_copy(input: &str, output: &str) {
    let mut hashes = Vec::new();
    {
        let src = open_or_exit(input, OpenMode::Read);
        let dst = open_or_exit(output, OpenMode::Write);
        for name in object_names(&src) {
            let object = load_or_exit(&src, &name);
            trace!("Copying {} ({})", name, object.type_name());
            if let Err(e) = object.save(&dst, &name) {
                eprintln!("Failed to save {}: {}", name, e);
                process::exit(1);
            }
            hashes.push((name, object.hash()));
        }
    }

    // Reopen the closed output and compare
    let dst = open_or_exit(output, OpenMode::Read);
    let mut mismatches = 0;
    for (name, expected) in &hashes {
        let actual = load_or_exit(&dst, name).hash();
        if actual != *expected {
            eprintln!("Hash mismatch for {}: {} != {}", name, actual, expected);
            mismatches += 1;
        }
    }

    println!("Copied {} objects from {} to {}", hashes.len(), input, output);
    if mismatches > 0 {
        process::exit(1);
    }
}

fn cmd_render(path: &str, name: Option<&str>) {
    let io = open_or_exit(path, OpenMode::Read);
    for name in selected_names(&io, name) {
        let object = load_or_exit(&io, &name);
        let mut renderer = RecordingRenderer::new();
        if let Err(e) = render(&object, &mut renderer) {
            eprintln!("Failed to render {}: {}", name, e);
            continue;
        }

        println!("{}:", name);
        let mut depth = 1usize;
        for call in &renderer.calls {
            if matches!(call, RenderCall::AttributeEnd | RenderCall::TransformEnd | RenderCall::MotionEnd) {
                depth = depth.saturating_sub(1);
            }
            println!("{}{}", "  ".repeat(depth), call);
            if matches!(
                call,
                RenderCall::AttributeBegin | RenderCall::TransformBegin | RenderCall::MotionBegin(_)
            ) {
                depth += 1;
            }
        }
    }
}

fn build_demo_scene() -> Result<(ObjectPtr, ObjectPtr)> {
    let mut root = Group::new();
    root.set_transform(Some(ObjectPtr::new(MatrixTransform::new(Mat4::from_translation(Vec3::Y)))))?;
    root.set_attribute("name", &ObjectPtr::new(StringData::new("demo".to_string())))?;
    let root = ObjectPtr::new(root);

    let mesh = MeshPrimitive::create_box(Box3f::new(Vec3::splat(-1.0), Vec3::ONE));
    Group::add_child(&root, ObjectPtr::new(mesh))?;

    let mut detail = Group::new();
    detail.set_transform(Some(ObjectPtr::new(MatrixTransform::new(Mat4::from_scale(Vec3::splat(0.5))))))?;
    let detail = ObjectPtr::new(detail);
    let points = PointsPrimitive::from_positions(vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z]);
    Group::add_child(&detail, ObjectPtr::new(points))?;
    Group::add_child(&detail, ObjectPtr::new(DiskPrimitive::new(0.5, 0.0, 360.0)))?;
    Group::add_child(&root, detail)?;

    // Two keys sharing one value
    let frame = ObjectPtr::new(IntData::new(1));
    let settings: CompoundObject = [
        ("startFrame", frame.clone()),
        ("currentFrame", frame),
        ("fps", ObjectPtr::new(FloatData::new(24.0))),
    ]
    .into_iter()
    .collect();

    Ok((root, ObjectPtr::new(settings)))
}

fn cmd_demo(output: &str) {
    let (scene, settings) = match build_demo_scene() {
        Ok(objects) => objects,
        Err(e) => {
            eprintln!("Failed to build demo scene: {}", e);
            process::exit(1);
        }
    };

    let io = open_or_exit(output, OpenMode::Write);
    for (name, object) in [("scene", &scene), ("settings", &settings)] {
        if let Err(e) = object.save(&io, name) {
            eprintln!("Failed to save {}: {}", name, e);
            process::exit(1);
        }
    }
    println!("Wrote demo scene to {}", output);
}

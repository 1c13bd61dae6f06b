use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use weave_core::classfile::{parse_method_descriptor, ClassFile};
use weave_core::pipeline::CLASS_SUFFIX;

const ACC_STATIC: u16 = 0x0008;

#[derive(Debug, Serialize)]
struct ClassReport {
    name: String,
    nested: bool,
    methods: Vec<MethodReport>,
}

#[derive(Debug, Serialize)]
struct MethodReport {
    name: String,
    descriptor: String,
    param_count: usize,
    is_static: bool,
}

/// Print the classes and method signatures of a class file or jar.
pub fn inspect_command(path: &str, json: bool) -> Result<()> {
    let path = Path::new(path);
    let reports = if path.extension().and_then(|e| e.to_str()) == Some("jar") {
        inspect_jar(path)?
    } else {
        vec![inspect_class_file(path)?]
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in reports {
        println!("{}{}", report.name, if report.nested { " (nested)" } else { "" });
        for method in report.methods {
            println!(
                "  {}{} {} ({} param(s))",
                if method.is_static { "static " } else { "" },
                method.name,
                method.descriptor,
                method.param_count
            );
        }
    }

    Ok(())
}

fn inspect_class_file(path: &Path) -> Result<ClassReport> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read class file {}", path.display()))?;
    class_report(&bytes).with_context(|| format!("Failed to parse {}", path.display()))
}

fn inspect_jar(path: &Path) -> Result<Vec<ClassReport>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open archive {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Failed to read archive {}", path.display()))?;

    let mut reports = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || !entry.name().ends_with(CLASS_SUFFIX) {
            continue;
        }
        let entry_name = entry.name().to_string();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes)?;
        reports.push(
            class_report(&bytes)
                .with_context(|| format!("Failed to parse archive entry {}", entry_name))?,
        );
    }
    Ok(reports)
}

fn class_report(bytes: &[u8]) -> Result<ClassReport> {
    let class = ClassFile::parse(bytes).map_err(|e| anyhow!(e))?;
    let name = class.class_name().map_err(|e| anyhow!(e))?.to_string();

    let mut methods = Vec::with_capacity(class.methods.len());
    for method in &class.methods {
        let method_name = class.pool.utf8(method.name_index).map_err(|e| anyhow!(e))?;
        let descriptor = class.pool.utf8(method.descriptor_index).map_err(|e| anyhow!(e))?;
        let param_count = parse_method_descriptor(descriptor)
            .map(|d| d.params.len())
            .unwrap_or(0);
        methods.push(MethodReport {
            name: method_name.to_string(),
            descriptor: descriptor.to_string(),
            param_count,
            is_static: method.access_flags & ACC_STATIC != 0,
        });
    }

    Ok(ClassReport { name: name.clone(), nested: name.contains('$'), methods })
}

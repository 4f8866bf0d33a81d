// Build script to compile GLSL shaders to SPIR-V
//
// Every shaders/<name>.{vert,frag} becomes shaders/<name>.spv.
// A missing glslc or a failed compile only warns: the renderer skips
// shader binaries it cannot read.

use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    let Ok(entries) = std::fs::read_dir("shaders") else {
        return;
    };

    for entry in entries.flatten() {
        let input = entry.path();
        let is_glsl = matches!(
            input.extension().and_then(|ext| ext.to_str()),
            Some("vert" | "frag")
        );
        if is_glsl {
            compile_shader(&input, &input.with_extension("spv"));
        }
    }
}

fn compile_shader(input: &Path, output: &Path) {
    // Check if glslc is available
    let result = Command::new("glslc").arg(input).arg("-o").arg(output).status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            println!(
                "cargo:warning=Failed to compile {}: exit code {:?}",
                input.display(),
                status.code()
            );
        }
        Err(e) => {
            println!("cargo:warning=glslc not found ({e}), {} was not compiled", input.display());
            println!(
                "cargo:warning=Install the Vulkan SDK or run: glslc {} -o {}",
                input.display(),
                output.display()
            );
        }
    }
}

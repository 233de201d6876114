use colored::*;
use terminal_size::{terminal_size, Height, Width};

pub fn print_banner(fast_model: &str, smart_model: &str, output_dir: &std::path::Path) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "deskhand".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}", name, version);

    let info = format!("  smart: {}  •  fast: {}", smart_model, fast_model).cyan();
    println!("{}", info);
    println!("  {}", output_dir.display().to_string().black().bold());

    println!("{}", line.black().bold());
    println!(
        "  Commands: {} quit  |  {} clear history  |  {} session stats",
        "exit".cyan(),
        "reset".cyan(),
        "status".cyan()
    );
    println!();
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red().bold(), msg.red());
}

pub fn print_tool_call(preview: &str) {
    println!("  {} {}", "⚙".magenta(), preview.black().bold());
}

use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌐 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_link(label: &str, url: &str) {
    println!(
        "  {} {}: {}",
        GLOBE,
        style(label).bold(),
        style(url).underlined().cyan()
    );
}

/// Renders a `[#####.....] 40%` bar for CLI progress lines.
pub fn progress_bar(percent: u8, width: usize) -> String {
    let filled = width * percent.min(100) as usize / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        ".".repeat(width - filled),
        percent.min(100)
    )
}

pub fn print_progress(percent: u8, message: &str) {
    println!(
        "  {} {}",
        style(progress_bar(percent, 24)).cyan(),
        style(message).dim()
    );
}

/// A titled group of commands in the help screen.
pub struct GuideSection {
    title: String,
    commands: Vec<(String, String)>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            commands: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.commands.push((name.to_string(), description.to_string()));
        self
    }

    pub fn print(&self) {
        println!("\n {}", style(&self.title).bold().underlined());
        let width = self.commands.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
        for (name, description) in &self.commands {
            println!(
                "   {:<width$}  {}",
                style(name).green(),
                style(description).dim(),
                width = width
            );
        }
    }
}

pub fn print_banner() {
    let lines: &[&str] = &[
        "     _ _     _                     _ _   _     ",
        " ___| (_) __| | ___  ___ _ __ ___ (_) |_| |__  ",
        "/ __| | |/ _` |/ _ \\/ __| '_ ` _ \\| | __| '_ \\ ",
        "\\__ \\ | | (_| |  __/\\__ \\ | | | | | | |_| | | |",
        "|___/_|_|\\__,_|\\___||___/_| |_| |_|_|\\__|_| |_|",
    ];

    // Gradient: #818cf8 → #22d3ee, left to right
    let stops: [(u8, u8, u8); 2] = [(129, 140, 248), (34, 211, 238)];
    let max_w = lines.iter().map(|l| l.len()).max().unwrap_or(1) as u32;

    println!();
    for line in lines {
        for (x, ch) in line.chars().enumerate() {
            if ch == ' ' {
                print!(" ");
                continue;
            }
            let t = (x as u32 * 1000 / max_w).min(1000);
            let (r, g, b) = lerp_color(stops[0], stops[1], t);
            print!("\x1b[38;2;{};{};{}m{}", r, g, b, ch);
        }
        println!();
    }
    print!("\x1b[0m");

    println!("\x1b[38;2;34;211;238mDecks drafted, checked and refined.\x1b[0m\n");
}

fn lerp_color(a: (u8, u8, u8), b: (u8, u8, u8), t: u32) -> (u8, u8, u8) {
    let r = (a.0 as u32 * (1000 - t) + b.0 as u32 * t) / 1000;
    let g = (a.1 as u32 * (1000 - t) + b.1 as u32 * t) / 1000;
    let b_val = (a.2 as u32 * (1000 - t) + b.2 as u32 * t) / 1000;
    (r as u8, g as u8, b_val as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_is_clamped() {
        assert_eq!(progress_bar(40, 10), "[####......]  40%");
        assert_eq!(progress_bar(250, 4), "[####] 100%");
    }

    #[test]
    fn gradient_endpoints_match_stops() {
        assert_eq!(lerp_color((0, 0, 0), (100, 200, 250), 0), (0, 0, 0));
        assert_eq!(lerp_color((0, 0, 0), (100, 200, 250), 1000), (100, 200, 250));
    }
}

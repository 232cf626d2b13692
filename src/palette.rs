use serde::{Deserialize, Serialize};

pub const PALETTE_LEN: usize = 20;

const LIGHT: [&str; PALETTE_LEN] = [
    "#2563eb", "#16a34a", "#ea580c", "#9333ea", "#dc2626", "#0d9488", "#d97706", "#db2777",
    "#4f46e5", "#65a30d", "#0891b2", "#e11d48", "#7c3aed", "#059669", "#ca8a04", "#0284c7",
    "#c026d3", "#475569", "#57534e", "#525252",
];

const DARK: [&str; PALETTE_LEN] = [
    "#60a5fa", "#4ade80", "#fb923c", "#c084fc", "#f87171", "#2dd4bf", "#fbbf24", "#f472b6",
    "#818cf8", "#a3e635", "#22d3ee", "#fb7185", "#a78bfa", "#34d399", "#facc15", "#38bdf8",
    "#e879f9", "#94a3b8", "#a8a29e", "#a3a3a3",
];

const GOLDEN_ANGLE: f64 = 137.508;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryType {
    Tactic,
    Contact,
    NotReached,
    Team,
}

impl CategoryType {
    /// Each category type walks the base palette from its own starting hue.
    fn offset(self) -> usize {
        match self {
            CategoryType::Tactic => 0,
            CategoryType::Contact => 5,
            CategoryType::NotReached => 10,
            CategoryType::Team => 15,
        }
    }
}

pub fn palette_color(category: CategoryType, theme: Theme, slot: usize) -> &'static str {
    let base = match theme {
        Theme::Light => &LIGHT,
        Theme::Dark => &DARK,
    };
    base[(slot + category.offset()) % PALETTE_LEN]
}

/// 32-bit FNV-1a, stable across runs and platforms.
pub fn name_hash(name: &str) -> u32 {
    name.bytes().fold(0x811c_9dc5u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

/// Colors past the predefined palette, spread by golden-angle hue steps.
pub fn generated_color(index: usize, theme: Theme) -> String {
    let hue = (index as f64 * GOLDEN_ANGLE) % 360.0;
    let lightness = match theme {
        Theme::Light => 45,
        Theme::Dark => 65,
    };
    format!("hsl({hue:.1}, 65%, {lightness}%)")
}

pub fn color_for_name(name: &str, category: CategoryType, theme: Theme) -> String {
    let slot = name_hash(name) as usize % PALETTE_LEN;
    palette_color(category, theme, slot).to_string()
}

/// Assigns one color per name without repeats: each name starts at its hash
/// slot and probes forward to the next free slot. Once the palette is
/// exhausted, further names get generated colors keyed by their position.
pub fn assign_colors(names: &[&str], category: CategoryType, theme: Theme) -> Vec<String> {
    let mut used = [false; PALETTE_LEN];

    names
        .iter()
        .enumerate()
        .map(|(position, name)| {
            let start = name_hash(name) as usize % PALETTE_LEN;
            let free = (0..PALETTE_LEN)
                .map(|step| (start + step) % PALETTE_LEN)
                .find(|slot| !used[*slot]);

            match free {
                Some(slot) => {
                    used[slot] = true;
                    palette_color(category, theme, slot).to_string()
                }
                None => generated_color(position, theme),
            }
        })
        .collect()
}

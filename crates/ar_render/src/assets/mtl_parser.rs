//! Companion `.mtl` file reader
//!
//! Only material names are read. Meshes that never switch material often
//! omit `usemtl`, and their single material name then has to come from the
//! `newmtl` entry of the companion file.

/// All `newmtl` names in declaration order
pub fn material_names(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("newmtl") => tokens.next().map(str::to_string),
                _ => None,
            }
        })
        .collect()
}

/// The first `newmtl` name, if any
pub fn first_material_name(contents: &str) -> Option<String> {
    material_names(contents).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_material_name() {
        let contents = "# Blender MTL File\nnewmtl Chair\nKd 0.8 0.8 0.8\nnewmtl Legs\n";
        assert_eq!(first_material_name(contents), Some("Chair".to_string()));
        assert_eq!(material_names(contents), vec!["Chair".to_string(), "Legs".to_string()]);
    }

    #[test]
    fn test_missing_name() {
        assert_eq!(first_material_name("Kd 1 1 1\nnewmtl\n"), None);
        assert_eq!(first_material_name(""), None);
    }

    #[test]
    fn test_indented_entries() {
        assert_eq!(first_material_name("  newmtl  Body \n"), Some("Body".to_string()));
    }
}

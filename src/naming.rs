use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::Path;

/// Per-job variables available to output filename templates:
/// `srate`, `group`, `master`, `master_ext`, `master_name`, `file`,
/// `file_ext`, `file_name`.
pub fn build_variables(
    srate: u32,
    group: &str,
    master: &str,
    child: &str,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("srate".to_string(), srate.to_string());
    vars.insert("group".to_string(), group.to_string());

    let (last, ext, stem) = split_name(master);
    vars.insert("master".to_string(), last);
    vars.insert("master_ext".to_string(), ext);
    vars.insert("master_name".to_string(), stem);

    let (last, ext, stem) = split_name(child);
    vars.insert("file".to_string(), last);
    vars.insert("file_ext".to_string(), ext);
    vars.insert("file_name".to_string(), stem);

    vars
}

fn split_name(name: &str) -> (String, String, String) {
    let path = Path::new(name);
    let last = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (last, ext, stem)
}

/// Expand `${var}` references in a filename template.
///
/// References to unknown variables are an error; everything else passes
/// through verbatim.
pub fn expand(template: &str, vars: &HashMap<String, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let Some(end) = tail.find('}') else {
            bail!("Unterminated variable reference in template '{template}'");
        };
        let name = &tail[..end];
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => bail!("Unknown template variable '{name}' in '{template}'"),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_job_variables() {
        let vars = build_variables(48000, "brass", "takes/trp unmuted.wav", "takes/trp plunger.wav");
        let out = expand("${master_name}/${file_name} - IR.wav", &vars).unwrap();
        assert_eq!(out, "trp unmuted/trp plunger - IR.wav");

        let out = expand("${group}-${srate}.${file_ext}", &vars).unwrap();
        assert_eq!(out, "brass-48000.wav");
    }

    #[test]
    fn literal_text_passes_through() {
        let vars = build_variables(44100, "g", "m.wav", "c.wav");
        assert_eq!(expand("plain name.wav", &vars).unwrap(), "plain name.wav");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let vars = build_variables(44100, "g", "m.wav", "c.wav");
        assert!(expand("${bogus}.wav", &vars).is_err());
    }

    #[test]
    fn unterminated_reference_is_an_error() {
        let vars = build_variables(44100, "g", "m.wav", "c.wav");
        assert!(expand("${file_name", &vars).is_err());
    }

    #[test]
    fn extensionless_names_leave_ext_empty() {
        let vars = build_variables(44100, "g", "master", "child");
        assert_eq!(expand("${master_ext}|${master_name}", &vars).unwrap(), "|master");
    }
}

//! Changelog rendering

use clkeep_core::{Settings, Wrapping};
use tracing::instrument;

use crate::markdown::{render_blocks, LinkReference};
use crate::model::{Changelog, Section};

/// Render the whole changelog
///
/// Link reference definitions no block mentions are dropped.
#[instrument(skip_all, fields(section_count = changelog.sections.len()))]
pub fn render(changelog: &Changelog, settings: &Settings, disable_wrapping: bool) -> String {
    render_sections(changelog, &changelog.sections, settings, disable_wrapping)
}

/// Render a subset of sections
///
/// Only link references mentioned by the rendered blocks are included.
pub fn render_sections<'a, I>(
    changelog: &Changelog,
    sections: I,
    settings: &Settings,
    disable_wrapping: bool,
) -> String
where
    I: IntoIterator<Item = &'a Section>,
{
    let blocks: Vec<_> = sections.into_iter().flat_map(|s| s.blocks()).collect();
    let references: Vec<LinkReference> = changelog
        .references
        .iter()
        .filter(|r| blocks.iter().any(|b| b.mentions(&r.label)))
        .cloned()
        .collect();
    render_blocks(blocks, &references, wrapping(settings, disable_wrapping))
}

fn wrapping(settings: &Settings, disable_wrapping: bool) -> Wrapping {
    if disable_wrapping {
        Wrapping::No
    } else {
        settings.format_wrapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::test_support::settings;

    const TEXT: &str = "# Changelog\n\n\
                        ## [1.1.0] - 2024-02-01\n\n\
                        - second change with a description that is long enough to need wrapping\n  somewhere\n\n\
                        ## [1.0.0] - 2024-01-01\n\n- first\n\n\
                        [1.1.0]: https://example.com/1.1.0\n\
                        [1.0.0]: https://example.com/1.0.0\n";

    #[test]
    fn test_render_unchanged_document() {
        let mut settings = settings();
        settings.format_wrapping = Wrapping::Keep;
        let mut diagnostics = settings.diagnostics();
        let changelog = parse(TEXT, &settings, &mut diagnostics);
        assert_eq!(render(&changelog, &settings, false), TEXT);
    }

    #[test]
    fn test_render_single_section() {
        let settings = settings();
        let mut diagnostics = settings.diagnostics();
        let changelog = parse(TEXT, &settings, &mut diagnostics);
        let output = render_sections(&changelog, [&changelog.sections[1]], &settings, true);
        assert_eq!(
            output,
            "## [1.1.0] - 2024-02-01\n\n\
             - second change with a description that is long enough to need wrapping somewhere\n\n\
             [1.1.0]: https://example.com/1.1.0\n"
        );
    }

    #[test]
    fn test_render_drops_unused_references() {
        let mut settings = settings();
        settings.format_wrapping = Wrapping::Keep;
        let mut diagnostics = settings.diagnostics();
        let text = "# Changelog\n\nSee [docs][guide].\n\n## [1.0.0] - 2024-01-01\n\n- first\n\n\
                    [1.0.0]: https://example.com/1.0.0\n\
                    [0.9.0]: https://example.com/0.9.0\n\
                    [Guide]: https://example.com/guide\n";
        let changelog = parse(text, &settings, &mut diagnostics);
        assert_eq!(changelog.references.len(), 3);
        assert_eq!(
            render(&changelog, &settings, false),
            "# Changelog\n\nSee [docs][guide].\n\n## [1.0.0] - 2024-01-01\n\n- first\n\n\
             [1.0.0]: https://example.com/1.0.0\n\
             [Guide]: https://example.com/guide\n"
        );
    }

    #[test]
    fn test_render_empty() {
        let settings = settings();
        assert_eq!(render(&Changelog::default(), &settings, false), "");
    }
}

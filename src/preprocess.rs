//! Rewrites implicit figure-display calls into explicit file saves.
//!
//! The executed process has no display, so `plt.show()` would silently drop
//! the current figure. Before execution every such line is rewritten to save
//! the figure into the workspace under a token-prefixed name the collector
//! can find afterwards.
//!
//! This is a deliberate line-oriented pattern match, not a parser: only a
//! line whose trimmed form is exactly `plt.show()` is recognized. Calls with
//! arguments, aliased imports, or multiple statements on one line pass
//! through untouched. JavaScript snippets are never preprocessed — that path
//! renders the source instead of executing it.

use crate::workspace::WorkspaceManager;

/// The exact call form recognized for rewriting.
const SHOW_CALL: &str = "plt.show()";

/// Rewrite every recognized `plt.show()` line into a
/// `plt.savefig('<token>_figure_<N>.png')` call.
///
/// N is a 1-based counter incremented per occurrence in textual order, so
/// figures come back in the order the code would have displayed them.
/// Indentation is preserved; all other lines pass through unchanged.
pub fn rewrite_show_calls(token: &str, code: &str) -> String {
    let mut show_count = 0;
    let lines: Vec<String> = code
        .split('\n')
        .map(|line| {
            if line.trim() == SHOW_CALL {
                show_count += 1;
                let save_call = format!(
                    "plt.savefig('{}')",
                    WorkspaceManager::figure_name(token, show_count)
                );
                line.replacen(SHOW_CALL, &save_call, 1)
            } else {
                line.to_string()
            }
        })
        .collect();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_show_rewritten() {
        let code = "import matplotlib.pyplot as plt\nplt.plot(x, y)\nplt.show()\n";
        let out = rewrite_show_calls("tok1", code);
        assert_eq!(
            out,
            "import matplotlib.pyplot as plt\nplt.plot(x, y)\nplt.savefig('tok1_figure_1.png')\n"
        );
    }

    #[test]
    fn test_counter_increments_in_textual_order() {
        let code = "plt.show()\nprint('between')\nplt.show()\nplt.show()";
        let out = rewrite_show_calls("ab", code);
        assert_eq!(
            out,
            "plt.savefig('ab_figure_1.png')\nprint('between')\nplt.savefig('ab_figure_2.png')\nplt.savefig('ab_figure_3.png')"
        );
    }

    #[test]
    fn test_indentation_preserved() {
        let code = "for i in range(2):\n    plt.show()";
        let out = rewrite_show_calls("t", code);
        assert_eq!(out, "for i in range(2):\n    plt.savefig('t_figure_1.png')");
    }

    #[test]
    fn test_unrecognized_forms_untouched() {
        // Arguments, comments, and aliased calls are intentionally not
        // recognized.
        let code = "plt.show(block=False)\nfig.show()\nplt.show()  # trailing comment\nx = 'plt.show()'";
        assert_eq!(rewrite_show_calls("t", code), code);
    }

    #[test]
    fn test_other_lines_unaltered() {
        let code = "a = 1\nb = 2\nprint(a + b)";
        assert_eq!(rewrite_show_calls("t", code), code);
    }

    #[test]
    fn test_empty_snippet() {
        assert_eq!(rewrite_show_calls("t", ""), "");
    }
}

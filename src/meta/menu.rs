//! The in-game cape picker: which buttons it shows and where they go. The buttons themselves are
//! created by `runtime::CapeRuntime::populate_menu` through the widget adapter.

use crate::adapter::widget::Bounds;

use super::catalog::CapeOption;

/// Capes shown on one page. Fixed so the layout stays stable on short windows.
pub const ROWS_PER_PAGE: usize = 8;

pub const NO_CAPE_LABEL: &str = "No Fishbattery Cape";
const SELECTED_MARKER: &str = "* ";

const ROW_WIDTH: i32 = 320;
const ROW_HEIGHT: i32 = 20;
const ROW_STEP: i32 = 24;
const FIRST_ROW_Y: i32 = 40;
const FOOTER_OFFSET: i32 = 28;
const NAV_WIDTH: i32 = 98;
const DONE_WIDTH: i32 = 100;

/// What pressing a menu button does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuAction {
    /// Clears the selection.
    Clear,

    /// Selects the cape with this id.
    Select(String),

    /// Shows another page.
    Page(usize),

    /// Closes the menu.
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuButton {
    pub label: String,
    pub action: MenuAction,
    pub bounds: Bounds,
}

/// A page of the cape picker.
pub struct CapeMenu {
    options: Vec<CapeOption>,
    selected_id: String,
    page: usize,
}

impl CapeMenu {
    /// Creates the menu showing `page`, clamped to the pages that exist.
    pub fn new(options: Vec<CapeOption>, selected_id: &str, page: usize) -> CapeMenu {
        let mut menu = CapeMenu {
            options,
            selected_id: selected_id.trim().to_string(),
            page: 0,
        };

        menu.page = page.min(menu.page_count() - 1);
        menu
    }

    /// Number of pages. There is always at least one, even with no capes.
    pub fn page_count(&self) -> usize {
        self.options.len().div_ceil(ROWS_PER_PAGE).max(1)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn prev_page(&self) -> usize {
        self.page.saturating_sub(1)
    }

    pub fn next_page(&self) -> usize {
        (self.page + 1).min(self.page_count() - 1)
    }

    fn decorate(label: String, selected: bool) -> String {
        if selected {
            format!("{SELECTED_MARKER}{label}")
        } else {
            label
        }
    }

    /// Labels and actions of the rows on the current page, starting with the "no cape" row.
    pub fn rows(&self) -> Vec<(String, MenuAction)> {
        let none = (
            CapeMenu::decorate(NO_CAPE_LABEL.to_string(), self.selected_id.is_empty()),
            MenuAction::Clear,
        );

        let capes = self
            .options
            .iter()
            .skip(self.page * ROWS_PER_PAGE)
            .take(ROWS_PER_PAGE)
            .map(|option| {
                let name = if option.name.is_empty() {
                    &option.id
                } else {
                    &option.name
                };

                let tier = if option.tier.is_empty() {
                    "free".to_string()
                } else {
                    option.tier.to_lowercase()
                };

                let label = CapeMenu::decorate(
                    format!("{name} [{tier}]"),
                    option.id == self.selected_id,
                );

                (label, MenuAction::Select(option.id.clone()))
            });

        std::iter::once(none).chain(capes).collect()
    }

    /// Every button on the current page, placed for a screen of the given size.
    pub fn layout(&self, screen_width: i32, screen_height: i32) -> Vec<MenuButton> {
        let left = (screen_width - ROW_WIDTH) / 2;
        let footer_y = screen_height - FOOTER_OFFSET;

        let rows = self.rows().into_iter().zip(0..).map(|((label, action), index)| MenuButton {
            label,
            action,
            bounds: Bounds {
                x: left,
                y: FIRST_ROW_Y + index * ROW_STEP,
                width: ROW_WIDTH,
                height: ROW_HEIGHT,
            },
        });

        let footer = [
            ("Prev", MenuAction::Page(self.prev_page()), left, NAV_WIDTH),
            ("Done", MenuAction::Done, (screen_width - DONE_WIDTH) / 2, DONE_WIDTH),
            (
                "Next",
                MenuAction::Page(self.next_page()),
                left + ROW_WIDTH - NAV_WIDTH,
                NAV_WIDTH,
            ),
        ]
        .map(|(label, action, x, width)| MenuButton {
            label: label.to_string(),
            action,
            bounds: Bounds {
                x,
                y: footer_y,
                width,
                height: ROW_HEIGHT,
            },
        });

        rows.chain(footer).collect()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;

    fn options(count: usize) -> Vec<CapeOption> {
        (0..count)
            .map(|i| CapeOption {
                id: format!("cape{i}"),
                name: format!("Cape {i}"),
                tier: if i == 0 { "Founder".into() } else { String::new() },
                ..CapeOption::default()
            })
            .collect()
    }

    #[test]
    fn first_page_lists_no_cape_then_capes() {
        let menu = CapeMenu::new(options(10), "cape1", 0);
        let labels = menu.rows().into_iter().map(|(label, _)| label).collect_vec();

        assert_eq!(labels.len(), 1 + ROWS_PER_PAGE);
        assert_eq!(labels[0], NO_CAPE_LABEL);
        assert_eq!(labels[1], "Cape 0 [founder]");
        assert_eq!(labels[2], "* Cape 1 [free]");
    }

    #[test]
    fn empty_selection_marks_the_no_cape_row() {
        let menu = CapeMenu::new(options(2), "", 0);
        let (label, action) = &menu.rows()[0];

        assert_eq!(label, "* No Fishbattery Cape");
        assert_eq!(action, &MenuAction::Clear);
    }

    #[test]
    fn pages_are_clamped() {
        let menu = CapeMenu::new(options(10), "", 7);

        assert_eq!(menu.page_count(), 2);
        assert_eq!(menu.page(), 1);
        assert_eq!(menu.next_page(), 1);
        assert_eq!(menu.prev_page(), 0);
        assert_eq!(menu.rows().len(), 1 + 2);

        let empty = CapeMenu::new(vec![], "", 3);
        assert_eq!(empty.page_count(), 1);
        assert_eq!(empty.page(), 0);
        assert_eq!(empty.prev_page(), 0);
    }

    #[test]
    fn layout_places_rows_and_footer() {
        let menu = CapeMenu::new(options(1), "", 0);
        let buttons = menu.layout(854, 480);

        assert_eq!(buttons.len(), 2 + 3);

        assert_eq!(
            buttons[1].bounds,
            Bounds {
                x: 267,
                y: 64,
                width: 320,
                height: 20
            }
        );

        let done = &buttons[3];
        assert_eq!(done.label, "Done");
        assert_eq!(done.action, MenuAction::Done);
        assert_eq!(done.bounds.x, 377);
        assert_eq!(done.bounds.y, 452);

        assert_eq!(buttons[4].bounds.x, 267 + 320 - 98);
        assert_eq!(buttons[4].action, MenuAction::Page(0));
    }
}

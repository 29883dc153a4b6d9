//! Working-paper template registry.
//!
//! Templates are static configuration data: each document code maps to a kind
//! and its blank content. The standard set below covers the shipped papers; an
//! embedding application can register its own.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::domain::{
    Attachment, Checklist, ChecklistRow, LineItemRow, LineItemSchedule, Materiality, ScheduleDoc,
    ScheduleLine, Section, SimpleSchedule,
};

#[derive(Debug, Clone)]
/// One registered working-paper template.
pub struct Template {
    code: String,
    title: String,
    content: ScheduleDoc,
}

impl Template {
    pub fn new(code: impl Into<String>, title: impl Into<String>, content: ScheduleDoc) -> Self {
        Self {
            code: code.into(),
            title: title.into(),
            content,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> &'static str {
        self.content.kind()
    }

    /// A fresh blank instance of the template's content.
    pub fn blank(&self) -> ScheduleDoc {
        self.content.clone()
    }
}

#[derive(Debug, Clone, Default)]
/// Registry of templates keyed by document code.
pub struct TemplateRegistry {
    templates: BTreeMap<String, Template>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template, replacing any previous entry for the same code.
    pub fn register(&mut self, template: Template) {
        self.templates.insert(template.code().to_string(), template);
    }

    pub fn get(&self, code: &str) -> Option<&Template> {
        self.templates.get(code)
    }

    pub fn codes(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// The standard working-paper set.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Template::new(
            "FA-1",
            "Property, plant and equipment movements",
            ScheduleDoc::LineItemSchedule(LineItemSchedule {
                title: "Property, plant and equipment movements".into(),
                rows: vec![
                    blank_line_item("cost_bfwd", "Cost brought forward"),
                    blank_line_item("additions", "Additions"),
                    blank_line_item("disposals", "Disposals"),
                    blank_line_item("depreciation", "Depreciation charge"),
                    blank_line_item("nbv_cfwd", "Net book value carried forward"),
                ],
            }),
        ));
        registry.register(Template::new(
            "ACC-2",
            "Accruals and prepayments",
            ScheduleDoc::SimpleSchedule(SimpleSchedule {
                attachments: vec![Attachment {
                    id: "acc2-support".into(),
                    name: "Supporting invoices".into(),
                    url: None,
                }],
                sections: vec![
                    Section {
                        title: "Accruals".into(),
                        notes: None,
                        lines: vec![
                            blank_input("rent", "Rent"),
                            blank_input("utilities", "Utilities"),
                            blank_input("audit_fee", "Audit fee"),
                            ScheduleLine::Total {
                                id: "accruals_total".into(),
                                label: "Total accruals".into(),
                                sum_of: vec!["rent".into(), "utilities".into(), "audit_fee".into()],
                            },
                        ],
                    },
                    Section {
                        title: "Prepayments".into(),
                        notes: None,
                        lines: vec![
                            blank_input("insurance", "Insurance"),
                            blank_input("subscriptions", "Subscriptions"),
                            ScheduleLine::Total {
                                id: "prepayments_total".into(),
                                label: "Total prepayments".into(),
                                sum_of: vec!["insurance".into(), "subscriptions".into()],
                            },
                        ],
                    },
                    Section {
                        title: "Net position".into(),
                        notes: None,
                        lines: vec![ScheduleLine::Calc {
                            id: "net_position".into(),
                            label: "Accruals less prepayments".into(),
                            add: vec!["accruals_total".into()],
                            subtract: vec!["prepayments_total".into()],
                        }],
                    },
                ],
            }),
        ));
        registry.register(Template::new(
            "COMP-1",
            "Completion checklist",
            ScheduleDoc::Checklist(Checklist {
                rows: vec![
                    blank_checklist_row("cast", "Schedules cast and cross-referenced"),
                    blank_checklist_row("ledger", "Balances agreed to the nominal ledger"),
                    blank_checklist_row("prior", "Prior-period figures agreed"),
                    blank_checklist_row("signoff", "All working papers reviewed"),
                ],
            }),
        ));
        registry.register(Template::new(
            "MAT-1",
            "Materiality memo",
            ScheduleDoc::Materiality(Materiality {
                generated_markdown: String::new(),
                generated_at: None,
            }),
        ));
        registry
    }
}

fn blank_line_item(id: &str, name: &str) -> LineItemRow {
    LineItemRow {
        id: id.into(),
        name: name.into(),
        description: None,
        current: None,
        prior: None,
    }
}

fn blank_input(id: &str, label: &str) -> ScheduleLine {
    ScheduleLine::Input {
        id: id.into(),
        label: label.into(),
        amount: None,
    }
}

fn blank_checklist_row(id: &str, text: &str) -> ChecklistRow {
    ChecklistRow {
        id: id.into(),
        text: text.into(),
        response: None,
    }
}

static STANDARD_TEMPLATES: Lazy<TemplateRegistry> = Lazy::new(TemplateRegistry::standard);

/// Process-wide standard registry.
pub fn standard_registry() -> &'static TemplateRegistry {
    &STANDARD_TEMPLATES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_set_covers_every_kind() {
        let registry = standard_registry();
        let kinds: Vec<_> = registry
            .codes()
            .iter()
            .map(|code| registry.get(code).unwrap().kind())
            .collect();
        for kind in [
            "LINE_ITEM_SCHEDULE",
            "SIMPLE_SCHEDULE",
            "CHECKLIST",
            "MATERIALITY",
        ] {
            assert!(kinds.contains(&kind), "missing {kind}");
        }
    }

    #[test]
    fn blanks_are_independent_instances() {
        let registry = standard_registry();
        let template = registry.get("ACC-2").unwrap();
        let mut first = template.blank();
        if let ScheduleDoc::SimpleSchedule(schedule) = &mut first {
            assert!(schedule.set_amount("rent", Some(100.0)));
        }
        let second = template.blank();
        let ScheduleDoc::SimpleSchedule(schedule) = second else {
            panic!("ACC-2 is a simple schedule");
        };
        assert!(matches!(
            schedule.line("rent"),
            Some(ScheduleLine::Input { amount: None, .. })
        ));
    }
}

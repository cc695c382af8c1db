//! In-process stand-in for the catalog UI.
//!
//! `FakeCatalog` renders the login, dashboard and inventory screens as a
//! flat list of elements with roles, accessible names, labels and row
//! membership, and answers `PageDriver` calls against it. Options inject
//! the failure modes the scenario must catch.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use catalog_e2e::config::Timeouts;
use catalog_e2e::{
    Choice, DialogEvent, DialogInterceptor, E2eError, E2eResult, ElementInfo, PageDriver, Probe,
    Query, ScenarioConfig, Strategy,
};

pub const BASE_URL: &str = "http://catalog.test";

pub const CATEGORIES: [(&str, &str); 4] = [
    ("CHEMICAL", "Químico"),
    ("EQUIPMENT", "Equipamento"),
    ("GLASSWARE", "Vidraria"),
    ("TOOL", "Ferramenta"),
];

/// Scenario configuration pointed at the fake, with short timeouts.
pub fn config(artifacts: &Path) -> ScenarioConfig {
    let mut config = ScenarioConfig::default();
    config.base_url = BASE_URL.to_string();
    config.timeouts = Timeouts {
        step_ms: 1_500,
        navigation_ms: 1_500,
        auth_ms: 1_500,
        poll_interval_ms: 100,
        stability_ms: 300,
        settle_ms: 0,
    };
    config.artifacts.dir = artifacts.to_path_buf();
    config.artifacts.run_id = Some("test-run".to_string());
    config.preflight.enabled = false;
    config
}

#[derive(Debug, Clone)]
pub struct FakeOptions {
    pub username: String,
    pub password: String,
    /// Category as a composite popup list instead of a native `<select>`
    pub composite_category: bool,
    /// Everything is invisible for this long after each page change
    pub render_latency: Duration,
    /// Items listed before the run starts
    pub seeded: Vec<String>,
    /// Deletion is confirmed but the item stays
    pub delete_is_noop: bool,
    /// Saving an edit adds a new row instead of renaming
    pub edit_duplicates: bool,
    /// The detail view leaves the name field editable
    pub view_is_editable: bool,
    /// Saving a new item raises an alert
    pub dialog_on_save: bool,
    /// Row actions are bare icons: no accessible name, no title
    pub unlabelled_actions: bool,
    pub screenshot_fails: bool,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "admin".to_string(),
            composite_category: true,
            render_latency: Duration::ZERO,
            seeded: Vec::new(),
            delete_is_noop: false,
            edit_duplicates: false,
            view_is_editable: false,
            dialog_on_save: false,
            unlabelled_actions: false,
            screenshot_fails: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub category: String,
    pub min_stock: String,
    pub description: String,
}

impl Item {
    fn seeded(name: &str) -> Self {
        Self {
            name: name.to_string(),
            category: "TOOL".to_string(),
            min_stock: "1".to_string(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Screen {
    Login,
    Dashboard,
    Inventory,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Create,
    Edit(usize),
    View(usize),
}

#[derive(Debug, Clone)]
struct Form {
    mode: Mode,
    name: String,
    category: String,
    min_stock: String,
    description: String,
    dropdown_open: bool,
}

impl Form {
    fn blank() -> Self {
        Self {
            mode: Mode::Create,
            name: String::new(),
            category: String::new(),
            min_stock: String::new(),
            description: String::new(),
            dropdown_open: false,
        }
    }

    fn from_item(mode: Mode, item: &Item) -> Self {
        Self {
            mode,
            name: item.name.clone(),
            category: item.category.clone(),
            min_stock: item.min_stock.clone(),
            description: item.description.clone(),
            dropdown_open: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Key {
    Username,
    Password,
    LoginSubmit,
    NavDashboard,
    NavInventory,
    AddItem,
    NameField,
    Category,
    CategoryOption(usize),
    MinStock,
    Description,
    SaveNew,
    SaveChanges,
    Cancel,
    CloseDetails,
    RowView(usize),
    RowEdit(usize),
    RowDelete(usize),
    Static,
}

#[derive(Debug, Clone)]
struct El {
    key: Key,
    tag: &'static str,
    role: Option<&'static str>,
    name: String,
    label: Option<String>,
    placeholder: Option<String>,
    title: Option<String>,
    text: Option<String>,
    /// Row this element sits in
    row: Option<usize>,
    /// Set on the row element itself
    row_id: Option<usize>,
    aria_hidden: bool,
    visible: bool,
    disabled: bool,
    value: Option<String>,
}

impl El {
    fn new(key: Key, tag: &'static str, role: Option<&'static str>) -> Self {
        Self {
            key,
            tag,
            role,
            name: String::new(),
            label: None,
            placeholder: None,
            title: None,
            text: None,
            row: None,
            row_id: None,
            aria_hidden: false,
            visible: true,
            disabled: false,
            value: None,
        }
    }

    fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    fn labelled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self.name = label.to_string();
        self
    }

    fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        if self.name.is_empty() {
            self.name = text.to_string();
        }
        self
    }

    fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_string());
        self
    }

    fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    fn in_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

fn norm(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn text_matches(actual: &str, expected: &str, exact: bool) -> bool {
    let (actual, expected) = (norm(actual), norm(expected));
    if exact {
        actual == expected
    } else {
        actual.contains(&expected)
    }
}

fn category_label(value: &str) -> &'static str {
    CATEGORIES
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, label)| *label)
        .unwrap_or("")
}

struct State {
    options: FakeOptions,
    url: String,
    screen: Screen,
    logged_in: bool,
    login_user: String,
    login_pass: String,
    login_error: bool,
    items: Vec<Item>,
    form: Option<Form>,
    changed_at: Instant,
    dialogs: Option<Arc<DialogInterceptor>>,
    console: Vec<String>,
    close_calls: usize,
}

impl State {
    fn touch(&mut self) {
        self.changed_at = Instant::now();
    }

    fn render(&self) -> Vec<El> {
        let mut els = Vec::new();

        match self.screen {
            Screen::Login => {
                els.push(El::new(Key::Static, "h1", Some("heading")).text("Bem-vindo de volta"));
                els.push(
                    El::new(Key::Username, "input", Some("textbox"))
                        .labelled("Usuário")
                        .value(&self.login_user),
                );
                els.push(El::new(Key::Password, "input", None).labelled("Senha").value(&self.login_pass));
                els.push(El::new(Key::LoginSubmit, "button", Some("button")).text("Entrar"));
                if self.login_error {
                    els.push(El::new(Key::Static, "div", Some("alert")).text("Credenciais inválidas"));
                }
            }
            Screen::Dashboard | Screen::Inventory => {
                els.push(El::new(Key::NavDashboard, "a", Some("link")).text("Dashboard"));
                els.push(El::new(Key::NavInventory, "a", Some("link")).text("Inventory"));
                if self.screen == Screen::Dashboard {
                    els.push(El::new(Key::Static, "h1", Some("heading")).text("Painel"));
                } else {
                    self.render_inventory(&mut els);
                }
            }
        }

        if self.form.is_some() {
            for el in &mut els {
                el.aria_hidden = true;
            }
        }
        if let Some(form) = &self.form {
            self.render_form(form, &mut els);
        }

        if self.changed_at.elapsed() < self.options.render_latency {
            for el in &mut els {
                el.visible = false;
            }
        }
        els
    }

    fn render_inventory(&self, els: &mut Vec<El>) {
        els.push(El::new(Key::Static, "h1", Some("heading")).text("Catálogo de Inventário"));
        els.push(El::new(Key::AddItem, "button", Some("button")).text("Adicionar Item"));
        els.push(El::new(Key::Static, "tr", Some("row")).named("Nome Categoria Estoque Mínimo Ações"));

        for (i, item) in self.items.iter().enumerate() {
            let label = category_label(&item.category);
            let mut row = El::new(Key::Static, "tr", Some("row"))
                .named(&format!("{} {} {}", item.name, label, item.min_stock));
            row.row_id = Some(i);
            els.push(row);
            els.push(El::new(Key::Static, "td", Some("cell")).text(&item.name).in_row(i));
            els.push(El::new(Key::Static, "td", Some("cell")).text(label).in_row(i));
            els.push(El::new(Key::Static, "td", Some("cell")).text(&item.min_stock).in_row(i));

            for (key, name) in [
                (Key::RowView(i), "Ver Detalhes"),
                (Key::RowEdit(i), "Editar"),
                (Key::RowDelete(i), "Excluir"),
            ] {
                let button = El::new(key, "button", Some("button")).in_row(i);
                els.push(if self.options.unlabelled_actions {
                    button
                } else {
                    button.named(name).titled(name)
                });
            }
        }
    }

    fn render_form(&self, form: &Form, els: &mut Vec<El>) {
        let read_only = matches!(form.mode, Mode::View(_));
        let title = match form.mode {
            Mode::Create => "Adicionar Novo Item",
            Mode::Edit(_) => "Editar Item",
            Mode::View(_) => "Detalhes do Item",
        };
        els.push(El::new(Key::Static, "h2", Some("heading")).text(title));
        els.push(
            El::new(Key::NameField, "input", Some("textbox"))
                .labelled("Nome do Item")
                .placeholder("ex: Acetona")
                .value(&form.name)
                .disabled(read_only && !self.options.view_is_editable),
        );

        if self.options.composite_category {
            let mut control = El::new(Key::Category, "div", Some("combobox"))
                .labelled("Categoria")
                .disabled(read_only);
            control.text = Some(category_label(&form.category).to_string());
            els.push(control);
            if form.dropdown_open {
                els.push(El::new(Key::Static, "ul", Some("listbox")));
                for (i, (_, label)) in CATEGORIES.iter().enumerate() {
                    els.push(El::new(Key::CategoryOption(i), "li", Some("option")).text(label));
                }
            }
        } else {
            els.push(
                El::new(Key::Category, "select", Some("combobox"))
                    .labelled("Categoria")
                    .value(&form.category)
                    .disabled(read_only),
            );
            for (i, (_, label)) in CATEGORIES.iter().enumerate() {
                els.push(El::new(Key::CategoryOption(i), "option", Some("option")).text(label).hidden());
            }
        }

        els.push(
            El::new(Key::MinStock, "input", Some("spinbutton"))
                .labelled("Estoque Mínimo")
                .value(&form.min_stock)
                .disabled(read_only),
        );
        els.push(
            El::new(Key::Description, "textarea", Some("textbox"))
                .labelled("Descrição")
                .value(&form.description)
                .disabled(read_only),
        );

        match form.mode {
            Mode::Create => {
                els.push(El::new(Key::Cancel, "button", Some("button")).text("Cancelar"));
                els.push(El::new(Key::SaveNew, "button", Some("button")).text("Salvar Item"));
            }
            Mode::Edit(_) => {
                els.push(El::new(Key::Cancel, "button", Some("button")).text("Cancelar"));
                els.push(El::new(Key::SaveChanges, "button", Some("button")).text("Salvar Alterações"));
            }
            Mode::View(_) => {
                els.push(El::new(Key::CloseDetails, "button", Some("button")).text("Fechar"));
            }
        }
    }

    fn find(&self, query: &Query) -> Vec<El> {
        let els = self.render();
        let exact = query.exact;

        let pool: Vec<&El> = match &query.scope {
            None => els.iter().collect(),
            Some(scope) => {
                let rows: Vec<usize> = els
                    .iter()
                    .filter(|e| e.role == Some("row") && !e.aria_hidden && text_matches(&e.name, scope, false))
                    .filter_map(|e| e.row_id)
                    .collect();
                els.iter()
                    .filter(|e| e.row.map_or(false, |r| rows.contains(&r)))
                    .collect()
            }
        };

        let attr = |value: &Option<String>, expected: &str| {
            value.as_deref().map_or(false, |v| text_matches(v, expected, exact))
        };

        let found: Vec<&El> = match &query.strategy {
            Strategy::Role { role, name } => pool
                .into_iter()
                .filter(|e| e.role == Some(role.as_str()) && !e.aria_hidden)
                .filter(|e| name.as_deref().map_or(true, |n| text_matches(&e.name, n, exact)))
                .collect(),
            Strategy::Label { text } => pool.into_iter().filter(|e| attr(&e.label, text.as_str())).collect(),
            Strategy::Placeholder { text } => {
                pool.into_iter().filter(|e| attr(&e.placeholder, text.as_str())).collect()
            }
            Strategy::Title { text } => pool.into_iter().filter(|e| attr(&e.title, text.as_str())).collect(),
            Strategy::Text { text } => pool.into_iter().filter(|e| attr(&e.text, text.as_str())).collect(),
            Strategy::Positional { role, index } => pool
                .into_iter()
                .filter(|e| e.role == Some(role.as_str()) && !e.aria_hidden)
                .nth(*index)
                .into_iter()
                .collect(),
        };
        found.into_iter().cloned().collect()
    }

    fn unique(&self, query: &Query) -> E2eResult<El> {
        let mut found = self.find(query);
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(E2eError::ElementNotFound {
                reference: query.to_string(),
                tried: query.to_string(),
            }),
            count => Err(E2eError::AmbiguousMatch {
                reference: query.to_string(),
                count,
            }),
        }
    }

    fn interactable(&self, query: &Query) -> E2eResult<El> {
        let el = self.unique(query)?;
        if !el.visible {
            return Err(E2eError::Driver(format!("{} is not visible", query)));
        }
        Ok(el)
    }

    fn raise_dialog(&self, kind: &str, message: &str) -> bool {
        match &self.dialogs {
            Some(interceptor) => interceptor.on_dialog(DialogEvent::new(kind, message)).accepts(),
            None => false,
        }
    }

    fn field(&mut self, key: Key) -> E2eResult<&mut String> {
        let form = self.form.as_mut();
        match (key, form) {
            (Key::Username, _) => Ok(&mut self.login_user),
            (Key::Password, _) => Ok(&mut self.login_pass),
            (Key::NameField, Some(form)) => Ok(&mut form.name),
            (Key::MinStock, Some(form)) => Ok(&mut form.min_stock),
            (Key::Description, Some(form)) => Ok(&mut form.description),
            (other, _) => Err(E2eError::Driver(format!("{:?} takes no text", other))),
        }
    }

    fn click(&mut self, key: Key) {
        match key {
            Key::LoginSubmit => {
                if self.login_user == self.options.username && self.login_pass == self.options.password {
                    self.logged_in = true;
                    self.login_error = false;
                    self.screen = Screen::Dashboard;
                    self.url = format!("{}/#/", BASE_URL);
                } else {
                    self.login_error = true;
                }
            }
            Key::NavDashboard => {
                self.screen = Screen::Dashboard;
                self.url = format!("{}/#/", BASE_URL);
            }
            Key::NavInventory => {
                self.screen = Screen::Inventory;
                self.url = format!("{}/#/inventory", BASE_URL);
            }
            Key::AddItem => self.form = Some(Form::blank()),
            Key::Category => {
                if self.options.composite_category {
                    if let Some(form) = self.form.as_mut() {
                        form.dropdown_open = !form.dropdown_open;
                    }
                }
                return;
            }
            Key::CategoryOption(i) => {
                if let Some(form) = self.form.as_mut() {
                    if form.dropdown_open {
                        form.category = CATEGORIES[i].0.to_string();
                        form.dropdown_open = false;
                    }
                }
                return;
            }
            Key::SaveNew => {
                if self.options.dialog_on_save {
                    self.raise_dialog("alert", "Item cadastrado com sucesso!");
                }
                if let Some(form) = self.form.take() {
                    self.items.push(Item {
                        name: form.name,
                        category: form.category,
                        min_stock: form.min_stock,
                        description: form.description,
                    });
                }
            }
            Key::SaveChanges => {
                if let Some(form) = self.form.take() {
                    if let Mode::Edit(i) = form.mode {
                        let updated = Item {
                            name: form.name,
                            category: form.category,
                            min_stock: form.min_stock,
                            description: form.description,
                        };
                        if self.options.edit_duplicates {
                            self.items.push(updated);
                        } else {
                            self.items[i] = updated;
                        }
                    }
                }
            }
            Key::Cancel | Key::CloseDetails => self.form = None,
            Key::RowView(i) => self.form = Some(Form::from_item(Mode::View(i), &self.items[i])),
            Key::RowEdit(i) => self.form = Some(Form::from_item(Mode::Edit(i), &self.items[i])),
            Key::RowDelete(i) => {
                let confirmed = self.raise_dialog("confirm", "Tem certeza que deseja excluir este item?");
                if confirmed && !self.options.delete_is_noop {
                    self.items.remove(i);
                }
            }
            _ => return,
        }
        self.touch();
    }
}

/// Cloneable handle; clones share the same page state.
#[derive(Clone)]
pub struct FakeCatalog {
    state: Arc<Mutex<State>>,
}

impl FakeCatalog {
    pub fn new(options: FakeOptions) -> Self {
        let items = options.seeded.iter().map(|name| Item::seeded(name)).collect();
        Self {
            state: Arc::new(Mutex::new(State {
                options,
                url: "about:blank".to_string(),
                screen: Screen::Login,
                logged_in: false,
                login_user: String::new(),
                login_pass: String::new(),
                login_error: false,
                items,
                form: None,
                changed_at: Instant::now(),
                dialogs: None,
                console: Vec::new(),
                close_calls: 0,
            })),
        }
    }

    pub fn items(&self) -> Vec<Item> {
        self.state.lock().items.clone()
    }

    pub fn item_names(&self) -> Vec<String> {
        self.items().into_iter().map(|i| i.name).collect()
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().logged_in
    }
}

#[async_trait]
impl PageDriver for FakeCatalog {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        let route = url.split_once('#').map(|(_, route)| route).unwrap_or("/");
        state.form = None;

        match route {
            "/login" => {
                state.screen = Screen::Login;
                state.login_user.clear();
                state.login_pass.clear();
                state.login_error = false;
                state.url = url.to_string();
            }
            _ if !state.logged_in => {
                state.screen = Screen::Login;
                state.url = format!("{}/#/login", BASE_URL);
            }
            "/inventory" => {
                state.screen = Screen::Inventory;
                state.url = url.to_string();
            }
            _ => {
                state.screen = Screen::Dashboard;
                state.url = format!("{}/#/", BASE_URL);
            }
        }
        state.touch();
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn probe(&self, query: &Query) -> E2eResult<Probe> {
        let found = self.state.lock().find(query);
        Ok(Probe {
            matches: found.len(),
            visible: found.iter().filter(|e| e.visible).count(),
        })
    }

    async fn inspect(&self, query: &Query) -> E2eResult<ElementInfo> {
        let el = self.state.lock().unique(query)?;
        Ok(ElementInfo {
            tag: el.tag.to_string(),
            role: el.role.map(str::to_string),
            disabled: el.disabled,
            read_only: false,
            value: el.value,
            visible: el.visible,
        })
    }

    async fn click(&self, query: &Query) -> E2eResult<()> {
        let mut state = self.state.lock();
        let el = state.interactable(query)?;
        if el.disabled {
            return Ok(());
        }
        state.click(el.key);
        Ok(())
    }

    async fn fill(&self, query: &Query, value: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        let el = state.interactable(query)?;
        if el.disabled {
            return Err(E2eError::Driver(format!("{}: element is not editable", query)));
        }
        *state.field(el.key)? = value.to_string();
        Ok(())
    }

    async fn type_text(&self, query: &Query, text: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        let el = state.interactable(query)?;
        if el.disabled {
            return Err(E2eError::Driver(format!("{}: element is disabled", query)));
        }
        state.field(el.key)?.push_str(text);
        Ok(())
    }

    async fn select_native(&self, query: &Query, choice: &Choice) -> E2eResult<()> {
        let mut state = self.state.lock();
        let el = state.interactable(query)?;
        if el.tag != "select" {
            return Err(E2eError::Driver(format!("{} is not a select", query)));
        }
        let (value, _) = CATEGORIES
            .iter()
            .find(|(value, label)| *value == choice.value || norm(label) == norm(&choice.label))
            .ok_or_else(|| E2eError::Driver(format!("no option {}", choice)))?;
        if let Some(form) = state.form.as_mut() {
            form.category = value.to_string();
        }
        Ok(())
    }

    async fn install_dialog_handler(&self, interceptor: Arc<DialogInterceptor>) -> E2eResult<()> {
        self.state.lock().dialogs = Some(interceptor);
        Ok(())
    }

    async fn remove_dialog_handler(&self) -> E2eResult<()> {
        self.state.lock().dialogs = None;
        Ok(())
    }

    async fn capture_console(&self) -> E2eResult<()> {
        self.state.lock().console.push("[log] catalog app ready".to_string());
        Ok(())
    }

    fn console_lines(&self) -> Vec<String> {
        self.state.lock().console.clone()
    }

    async fn screenshot(&self, path: &Path) -> E2eResult<()> {
        if self.state.lock().options.screenshot_fails {
            return Err(E2eError::Driver("screenshot capture failed".to_string()));
        }
        std::fs::write(path, b"\x89PNG\r\n\x1a\nfake")?;
        Ok(())
    }

    async fn content(&self) -> E2eResult<String> {
        let state = self.state.lock();
        let body: String = state
            .render()
            .iter()
            .map(|e| format!("<{0}>{1}</{0}>\n", e.tag, e.text.as_deref().unwrap_or(&e.name)))
            .collect();
        Ok(format!("<html><body>\n{}</body></html>\n", body))
    }

    async fn close(&self) -> E2eResult<()> {
        self.state.lock().close_calls += 1;
        Ok(())
    }
}

//! UI map: every semantic reference the CRUD flow touches.
//!
//! Defaults describe the LabControl inventory catalog (Portuguese UI). Any
//! entry can be overridden from the scenario YAML under `ui:`.

use serde::{Deserialize, Serialize};

use crate::locator::ElementRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiMap {
    // Login view
    pub username: ElementRef,
    pub password: ElementRef,
    pub login_submit: ElementRef,
    pub login_error: ElementRef,

    // Navigation
    pub dashboard_marker: ElementRef,
    pub inventory_link: ElementRef,
    pub catalog_header: ElementRef,

    // Catalog form
    pub add_button: ElementRef,
    pub create_title: ElementRef,
    pub edit_title: ElementRef,
    pub view_title: ElementRef,
    pub name_field: ElementRef,
    pub category_field: ElementRef,
    pub category_options: ElementRef,
    pub min_stock_field: ElementRef,
    pub description_field: ElementRef,
    pub save_new: ElementRef,
    pub save_changes: ElementRef,
    pub close_details: ElementRef,

    // Row actions, scoped to a listing row at use
    pub view_action: ElementRef,
    pub edit_action: ElementRef,
    pub delete_action: ElementRef,
}

impl UiMap {
    /// The item's name cell in the listing.
    pub fn listing_entry(&self, name: &str) -> ElementRef {
        ElementRef::new(format!("listing entry '{}'", name))
            .text(name)
            .exact()
    }

    /// Option of the category dropdown once it is open.
    pub fn category_option(&self, label: &str) -> ElementRef {
        ElementRef::new(format!("category option '{}'", label)).role("option", label)
    }
}

impl Default for UiMap {
    fn default() -> Self {
        Self {
            username: ElementRef::new("username field")
                .label("Usuário")
                .role("textbox", "Usuário"),
            password: ElementRef::new("password field").label("Senha"),
            login_submit: ElementRef::new("sign-in button")
                .role("button", "Entrar")
                .text("Entrar"),
            login_error: ElementRef::new("login error").text("Credenciais inválidas"),

            dashboard_marker: ElementRef::new("dashboard heading")
                .role("heading", "Painel")
                .exact(),
            inventory_link: ElementRef::new("inventory link")
                .role("link", "Inventory")
                .text("Inventory"),
            catalog_header: ElementRef::new("catalog heading")
                .role("heading", "Catálogo de Inventário")
                .text("Catálogo de Inventário"),

            add_button: ElementRef::new("add item button")
                .role("button", "Adicionar Item")
                .text("Adicionar Item"),
            create_title: ElementRef::new("create form title").text("Adicionar Novo Item"),
            edit_title: ElementRef::new("edit form title").text("Editar Item"),
            view_title: ElementRef::new("detail view title").text("Detalhes do Item"),
            name_field: ElementRef::new("name field")
                .label("Nome do Item")
                .placeholder("ex: Acetona"),
            category_field: ElementRef::new("category control")
                .label("Categoria")
                .role("combobox", "Categoria"),
            category_options: ElementRef::new("category option list").any_role("listbox"),
            min_stock_field: ElementRef::new("minimum stock field")
                .label("Estoque Mínimo")
                .role("spinbutton", "Estoque Mínimo"),
            description_field: ElementRef::new("description field").label("Descrição"),
            save_new: ElementRef::new("save item button")
                .role("button", "Salvar Item")
                .text("Salvar Item"),
            save_changes: ElementRef::new("save changes button")
                .role("button", "Salvar Alterações")
                .text("Salvar Alterações"),
            close_details: ElementRef::new("close button")
                .role("button", "Fechar")
                .text("Fechar"),

            // Positional entries only apply with allow_positional_fallback:
            // they assume the row renders view, edit, delete in that order.
            view_action: ElementRef::new("view action")
                .role("button", "Ver Detalhes")
                .title("Ver Detalhes")
                .positional("button", 0),
            edit_action: ElementRef::new("edit action")
                .role("button", "Editar")
                .title("Editar")
                .positional("button", 1),
            delete_action: ElementRef::new("delete action")
                .role("button", "Excluir")
                .title("Excluir")
                .positional("button", 2),
        }
    }
}

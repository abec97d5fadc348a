//! Формирование объявлений на Bluespec SystemVerilog (BSV).
//!
//! Каждая функция отображает одну конкретную запись в одну строку
//! объявления.

use crate::csr::{Csr, CsrField, Field};

/// Регистр, хранящий состояние поля. Для полей без состояния `None`.
pub fn field_init(field: &Field) -> Option<String> {
    field.holds_state().then(|| {
        format!(
            "Reg#(Bit#({})) {}_field <- mkReg(0)",
            field.width, field.name
        )
    })
}

/// Ссылка на регистр поля внутри объявления CSR.
pub fn field_ref(field: &CsrField) -> String {
    match field {
        CsrField::ReadOnly(inner) => format!("readOnlyReg({}_field)", inner.name),
        CsrField::Field(inner) if inner.holds_state() => format!("{}_field", inner.name),
        CsrField::Field(inner) => format!("readOnlyReg({}'b0)", inner.width),
    }
}

/// Объявление CSR как конкатенации регистров полей.
pub fn csr_init(csr: &Csr) -> String {
    let refs = csr
        .fields
        .iter()
        .map(field_ref)
        .collect::<Vec<_>>()
        .join(", ");
    if csr.fields.len() == 1 {
        format!("Reg#(Bit#({})) {} = {};", csr.width(), csr.name, refs)
    } else {
        format!(
            "Reg#(Bit#({})) {} = concatReg{}({});",
            csr.width(),
            csr.name,
            csr.fields.len(),
            refs
        )
    }
}

/// Имя, под которым CSR доступен в BSV.
pub fn csr_ref(csr: &Csr) -> &str {
    &csr.name
}

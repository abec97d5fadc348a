//! Каталог CSR привилегированной архитектуры RISC-V.
//!
//! Каталог описан один раз через трейт [`Mode`]: в символическом режиме
//! ширины полей зависят от символа `xlen`, в энергичном режиме они
//! вычисляются сразу. Поля и регистры отслеживаются в порядке создания.
//!
//! Раскладки `mstatus`, `sstatus` и ширины полей `satp` различаются для
//! RV32 и RV64 и выбираются по условию `xlen != 32`.

use log::debug;

use crate::csr::{
    csr_constructor, field_constructor, read_only_constructor, wiri_constructor,
    wpri_constructor, Csr, Field, FieldKind,
};
use crate::deferred::Deferred;
use crate::error::{SymbError, SymbResult};
use crate::evaluator::{Context, Evaluator};
use crate::mode::Mode;
use crate::node::Operand;
use crate::operands;
use crate::registry::{Constructor, Tracker};
use crate::value::{DomainObject, Value};

/// Имя параметра разрядности.
pub const XLEN: &str = "xlen";

/// Построенный каталог.
#[derive(Debug)]
pub struct Catalog {
    /// Поле `vm_mode` регистра `satp`; пример параметрической ширины
    pub vm_mode: Deferred,
    pub fields: Tracker,
    pub csrs: Tracker,
}

/// Конкретные поля и регистры для одного значения `xlen`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub fields: Vec<Field>,
    pub csrs: Vec<Csr>,
}

impl Catalog {
    /// Реализовать символический каталог в контексте.
    pub fn realize(&self, evaluator: &mut Evaluator, ctx: &Context) -> SymbResult<Resolved> {
        Ok(Resolved {
            fields: records(&self.fields.realize(evaluator, ctx)?)?,
            csrs: records(&self.csrs.realize(evaluator, ctx)?)?,
        })
    }

    /// Записи, созданные энергичным построением.
    pub fn concrete(&self) -> SymbResult<Resolved> {
        Ok(Resolved {
            fields: records(&self.fields.concrete.entries())?,
            csrs: records(&self.csrs.concrete.entries())?,
        })
    }
}

fn records<T: DomainObject + Clone>(values: &[Value]) -> SymbResult<Vec<T>> {
    values
        .iter()
        .map(|value| {
            value.downcast_ref::<T>().cloned().ok_or_else(|| {
                SymbError::InternalConsistency(format!(
                    "registry holds {} where a record was expected",
                    value.type_name()
                ))
            })
        })
        .collect()
}

struct Builder<'a, M: Mode> {
    mode: &'a M,
    field: Constructor,
    csr: Constructor,
    wiri: Constructor,
    wpri: Constructor,
    read_only: Constructor,
}

impl<M: Mode> Builder<'_, M> {
    fn field(&self, name: &str, width: impl Into<Operand>) -> SymbResult<Deferred> {
        let width: Operand = width.into();
        self.mode.call(&self.field, operands![name, width])
    }

    fn field_of(&self, name: &str, width: impl Into<Operand>, kind: FieldKind) -> SymbResult<Deferred> {
        let width: Operand = width.into();
        self.mode.call(&self.field, operands![name, width, kind])
    }

    fn wiri(&self, width: impl Into<Operand>) -> SymbResult<Deferred> {
        self.mode.call(&self.wiri, vec![width.into()])
    }

    fn wpri(&self, width: impl Into<Operand>) -> SymbResult<Deferred> {
        self.mode.call(&self.wpri, vec![width.into()])
    }

    fn read_only(&self, field: &Deferred) -> SymbResult<Deferred> {
        self.mode.call(&self.read_only, operands![field])
    }

    fn csr(&self, name: &str, address: i64, fields: Vec<Operand>) -> SymbResult<Deferred> {
        let mut args = operands![name, address];
        args.extend(fields);
        self.mode.call(&self.csr, args)
    }
}

/// Построить каталог в заданном режиме.
pub fn build<M: Mode>(mode: &M) -> SymbResult<Catalog> {
    use FieldKind::{Derived, Warl, Wlrl};

    let fields = Tracker::new();
    let csrs = Tracker::new();
    let b = Builder {
        mode,
        field: Constructor::tracked(field_constructor(), &fields),
        csr: Constructor::tracked(csr_constructor(), &csrs),
        wiri: Constructor::new(wiri_constructor()),
        wpri: Constructor::new(wpri_constructor()),
        read_only: Constructor::new(read_only_constructor()),
    };
    let xlen = mode.symbol(XLEN)?;
    let rv64 = xlen.ne(32);

    // misa
    let mxl = b.field_of("mxl", 2, Warl)?;
    let extensions = b.field_of("extensions", 26, Warl)?;

    // mstatus
    let sxl = b.field("sxl", 2)?;
    let uxl = b.field("uxl", 2)?;
    let tsr = b.field("tsr", 1)?;
    let tw = b.field("tw", 1)?;
    let tvm = b.field("tvm", 1)?;
    let mxr = b.field("mxr", 1)?;
    let sum = b.field("sum", 1)?;
    let mprv = b.field("mprv", 1)?;
    let xs = b.field("xs", 2)?;
    let fs = b.field("fs", 2)?;
    let mpp = b.field("mpp", 2)?;
    let spp = b.field("spp", 1)?;
    let mpie = b.field("mpie", 1)?;
    let spie = b.field("spie", 1)?;
    let upie = b.field("upie", 1)?;
    let mie = b.field("mie", 1)?;
    let sie = b.field("sie", 1)?;
    let uie = b.field("uie", 1)?;
    // !((fs == 0) && (xs == 0))
    let sd = b.field_of("sd", 1, Derived)?;

    // mtvec
    let mtvec_base = b.field("mtvec_base", &xlen - 2)?;
    let mtvec_mode = b.field("mtvec_mode", 2)?;

    let medeleg = b.field_of("medeleg", &xlen, Warl)?;
    let mideleg = b.field_of("mideleg", &xlen, Warl)?;

    // mip
    let meip = b.field("meip", 1)?;
    let seip = b.field("seip", 1)?;
    let ueip = b.field("ueip", 1)?;
    let mtip = b.field("mtip", 1)?;
    let stip = b.field("stip", 1)?;
    let utip = b.field("utip", 1)?;
    let msip = b.field("msip", 1)?;
    let ssip = b.field("ssip", 1)?;
    let usip = b.field("usip", 1)?;

    // mie
    let meie = b.field("meie", 1)?;
    let seie = b.field("seie", 1)?;
    let ueie = b.field("ueie", 1)?;
    let mtie = b.field("mtie", 1)?;
    let stie = b.field("stie", 1)?;
    let utie = b.field("utie", 1)?;
    let msie = b.field("msie", 1)?;
    let ssie = b.field("ssie", 1)?;
    let usie = b.field("usie", 1)?;

    let mcycle = b.field_of("mcycle", 64, Derived)?;
    let minstret = b.field_of("minstret", 64, Derived)?;

    // mcounteren: всегда 32 бита, расширяется нулями
    let m_hpm = b.field_of("m_hpm", 29, Warl)?;
    let m_ir = b.field_of("m_ir", 1, Warl)?;
    let m_tm = b.field_of("m_tm", 1, Warl)?;
    let m_cy = b.field_of("m_cy", 1, Warl)?;

    let mscratch = b.field("mscratch", &xlen)?;
    // младшие 1 или 2 бита должны быть только для чтения
    let mepc = b.field("mepc", &xlen)?;
    let mcause_interrupt = b.field("mcause_interrupt", 1)?;
    let mcause_code = b.field_of("mcause_code", &xlen - 1, Wlrl)?;
    let mtval = b.field("mtval", &xlen)?;

    // scounteren
    let s_hpm = b.field_of("s_hpm", 29, Warl)?;
    let s_ir = b.field_of("s_ir", 1, Warl)?;
    let s_tm = b.field_of("s_tm", 1, Warl)?;
    let s_cy = b.field_of("s_cy", 1, Warl)?;

    let sscratch = b.field("sscratch", &xlen)?;
    let sepc = b.field("sepc", &xlen)?;
    let scause_interrupt = b.field("scause_interrupt", 1)?;
    let scause_code = b.field_of("scause_code", &xlen - 1, Wlrl)?;
    let stval = b.field("stval", &xlen)?;

    // satp
    let vm_mode_width = mode.cond(rv64.clone(), || Ok(4.into()), || Ok(1.into()))?;
    let vm_mode = b.field("vm_mode", vm_mode_width)?;
    let asid_width = mode.cond(rv64.clone(), || Ok(16.into()), || Ok(9.into()))?;
    let asid = b.field("asid", asid_width)?;
    let ppn_width = mode.cond(rv64.clone(), || Ok(44.into()), || Ok(22.into()))?;
    let ppn = b.field("ppn", ppn_width)?;

    // fcsr
    let fflags = b.field("fflags", 5)?;
    let frm = b.field("frm", 3)?;

    b.csr("misa", 0x301, operands![&mxl, b.wiri(&xlen - 28)?, &extensions])?;

    let mstatus = mode.cond(
        rv64.clone(),
        || {
            Ok(Deferred::tuple(operands![
                b.read_only(&sd)?, b.wpri(&xlen - 37)?, &sxl, &uxl, b.wpri(9)?,
                &tsr, &tw, &tvm, &mxr, &sum, &mprv, &xs, &fs, &mpp, b.wpri(2)?,
                &spp, &mpie, b.wpri(1)?, &spie, &upie, &mie, b.wpri(1)?, &sie, &uie,
            ]))
        },
        || {
            Ok(Deferred::tuple(operands![
                b.read_only(&sd)?, b.wpri(8)?,
                &tsr, &tw, &tvm, &mxr, &sum, &mprv, &xs, &fs, &mpp, b.wpri(2)?,
                &spp, &mpie, b.wpri(1)?, &spie, &upie, &mie, b.wpri(1)?, &sie, &uie,
            ]))
        },
    )?;
    b.csr("mstatus", 0x300, operands![mstatus])?;

    b.csr("mtvec", 0x305, operands![&mtvec_base, &mtvec_mode])?;
    b.csr("medeleg", 0x302, operands![&medeleg])?;
    b.csr("mideleg", 0x303, operands![&mideleg])?;
    b.csr(
        "mip",
        0x344,
        operands![
            b.wiri(&xlen - 12)?, b.read_only(&meip)?, b.wiri(1)?, &seip, &ueip,
            b.read_only(&mtip)?, b.wiri(1)?, &stip, &utip,
            b.read_only(&msip)?, b.wiri(1)?, &ssip, &usip,
        ],
    )?;
    b.csr(
        "mie",
        0x304,
        operands![
            b.wpri(&xlen - 12)?, &meie, b.wpri(1)?, &seie, &ueie,
            &mtie, b.wpri(1)?, &stie, &utie,
            &msie, b.wpri(1)?, &ssie, &usie,
        ],
    )?;
    b.csr("mcycle", 0xB00, operands![b.read_only(&mcycle)?])?;
    b.csr("minstret", 0xB02, operands![b.read_only(&minstret)?])?;
    b.csr("mcounteren", 0x306, operands![&m_hpm, &m_ir, &m_tm, &m_cy])?;
    b.csr("mscratch", 0x340, operands![&mscratch])?;
    b.csr("mepc", 0x341, operands![&mepc])?;
    b.csr("mcause", 0x342, operands![&mcause_interrupt, &mcause_code])?;
    b.csr("mtval", 0x343, operands![&mtval])?;

    let sstatus = mode.cond(
        rv64,
        || {
            Ok(Deferred::tuple(operands![
                b.read_only(&sd)?, b.wpri(&xlen - 35)?, &uxl, b.wpri(12)?, &mxr, &sum, b.wpri(1)?,
                &xs, &fs, b.wpri(4)?, &spp, b.wpri(2)?, &spie, &upie, b.wpri(2)?, &sie, &uie,
            ]))
        },
        || {
            Ok(Deferred::tuple(operands![
                b.read_only(&sd)?, b.wpri(11)?, &mxr, &sum, b.wpri(1)?,
                &xs, &fs, b.wpri(4)?, &spp, b.wpri(2)?, &spie, &upie, b.wpri(2)?, &sie, &uie,
            ]))
        },
    )?;
    b.csr("sstatus", 0x100, operands![sstatus])?;

    // TODO: sip и sie дополнительно маскируются регистром mideleg
    b.csr(
        "sip",
        0x144,
        operands![
            b.wiri(&xlen - 10)?, b.read_only(&seip)?, &ueip, b.wiri(2)?,
            b.read_only(&stip)?, b.read_only(&utip)?, b.wiri(2)?, &ssip, &usip,
        ],
    )?;
    b.csr(
        "sie",
        0x104,
        operands![
            b.wpri(&xlen - 10)?, &seie, &ueie, b.wpri(2)?,
            &stie, &utie, b.wpri(2)?, &ssie, &usie,
        ],
    )?;
    b.csr("scounteren", 0x106, operands![&s_hpm, &s_ir, &s_tm, &s_cy])?;
    b.csr("sscratch", 0x140, operands![&sscratch])?;
    b.csr("sepc", 0x141, operands![&sepc])?;
    b.csr("scause", 0x142, operands![&scause_interrupt, &scause_code])?;
    b.csr("stval", 0x143, operands![&stval])?;
    b.csr("satp", 0x180, operands![&vm_mode, &asid, &ppn])?;

    b.csr("fflags", 0x001, operands![b.wiri(&xlen - 5)?, &fflags])?;
    b.csr("frm", 0x002, operands![b.wiri(&xlen - 3)?, &frm])?;
    b.csr("fcsr", 0x003, operands![b.wpri(&xlen - 8)?, &frm, &fflags])?;

    debug!(
        "built {} catalog: {} fields, {} CSRs",
        mode.name(),
        fields.deferred.len() + fields.concrete.len(),
        csrs.deferred.len() + csrs.concrete.len()
    );

    Ok(Catalog {
        vm_mode,
        fields,
        csrs,
    })
}

// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

use bitmatch::bitmatch;

use crate::Nintendo64;

impl Nintendo64 {
    #[bitmatch]
    pub fn get_mnemonic(inst: u32) -> String {
        #[bitmatch]
        match inst {
            "00000000000000000000000000000000" => "nop".to_string(),
            "000000_00000_ttttt_ddddd_mmmmm_000000" => format!("sll r{d}, r{t}, {m}"),
            "000000_00000_ttttt_ddddd_mmmmm_000010" => format!("srl r{d}, r{t}, {m}"),
            "000000_00000_ttttt_ddddd_mmmmm_000011" => format!("sra r{d}, r{t}, {m}"),
            "000000_sssss_ttttt_ddddd_?????_000100" => format!("sllv r{d}, r{t}, r{s}"),
            "000000_sssss_ttttt_ddddd_?????_000110" => format!("srlv r{d}, r{t}, r{s}"),
            "000000_sssss_ttttt_ddddd_?????_000111" => format!("srav r{d}, r{t}, r{s}"),
            "000000_sssss_?????_?????_?????_001000" => format!("jr r{s}"),
            "000000_sssss_?????_ddddd_?????_001001" => format!("jalr r{d}, r{s}"),
            "000000_mmmmm_mmmmm_mmmmm_mmmmm_001100" => format!("syscall 0x{m:X}"),
            "000000_mmmmm_mmmmm_mmmmm_mmmmm_001101" => format!("break 0x{m:X}"),
            "000000_?????_?????_?????_?????_001111" => "sync".to_string(),
            "000000_?????_?????_ddddd_?????_010000" => format!("mfhi r{d}"),
            "000000_sssss_?????_?????_?????_010001" => format!("mthi r{s}"),
            "000000_?????_?????_ddddd_?????_010010" => format!("mflo r{d}"),
            "000000_sssss_?????_?????_?????_010011" => format!("mtlo r{s}"),
            "000000_sssss_ttttt_ddddd_?????_010100" => format!("dsllv r{d}, r{t}, r{s}"),
            "000000_sssss_ttttt_ddddd_?????_010110" => format!("dsrlv r{d}, r{t}, r{s}"),
            "000000_sssss_ttttt_ddddd_?????_010111" => format!("dsrav r{d}, r{t}, r{s}"),
            "000000_sssss_ttttt_?????_?????_011000" => format!("mult r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_011001" => format!("multu r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_011010" => format!("div r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_011011" => format!("divu r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_011100" => format!("dmult r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_011101" => format!("dmultu r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_011110" => format!("ddiv r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_011111" => format!("ddivu r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100000" => format!("add r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100001" => format!("addu r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100010" => format!("sub r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100011" => format!("subu r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100100" => format!("and r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100101" => format!("or r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100110" => format!("xor r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_100111" => format!("nor r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_101010" => format!("slt r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_101011" => format!("sltu r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_101100" => format!("dadd r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_101101" => format!("daddu r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_101110" => format!("dsub r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_ddddd_?????_101111" => format!("dsubu r{d}, r{s}, r{t}"),
            "000000_sssss_ttttt_?????_?????_110ooo" => format!("t{} r{s}, r{t}", trap_cond(o)),
            "000000_?????_ttttt_ddddd_mmmmm_111000" => format!("dsll r{d}, r{t}, {m}"),
            "000000_?????_ttttt_ddddd_mmmmm_111010" => format!("dsrl r{d}, r{t}, {m}"),
            "000000_?????_ttttt_ddddd_mmmmm_111011" => format!("dsra r{d}, r{t}, {m}"),
            "000000_?????_ttttt_ddddd_mmmmm_111100" => format!("dsll32 r{d}, r{t}, {m}"),
            "000000_?????_ttttt_ddddd_mmmmm_111110" => format!("dsrl32 r{d}, r{t}, {m}"),
            "000000_?????_ttttt_ddddd_mmmmm_111111" => format!("dsra32 r{d}, r{t}, {m}"),

            "000001_sssss_000ll_mmmmm_mmmmm_mmmmmm" => {
                format!("{} r{s}, 0x{m:X}", regimm_branch(l, false))
            }
            "000001_sssss_100ll_mmmmm_mmmmm_mmmmmm" => {
                format!("{} r{s}, 0x{m:X}", regimm_branch(l, true))
            }
            "000001_sssss_01ooo_mmmmm_mmmmm_mmmmmm" => {
                format!("t{}i r{s}, 0x{m:X}", trap_cond(o))
            }

            "000010_mmmmm_mmmmm_mmmmm_mmmmm_mmmmmm" => format!("j 0x{:X}", m << 2),
            "000011_mmmmm_mmmmm_mmmmm_mmmmm_mmmmmm" => format!("jal 0x{:X}", m << 2),
            "0l0100_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => {
                format!("beq{} r{s}, r{t}, 0x{m:X}", likely(l))
            }
            "0l0101_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => {
                format!("bne{} r{s}, r{t}, 0x{m:X}", likely(l))
            }
            "0l0110_sssss_?????_mmmmm_mmmmm_mmmmmm" => format!("blez{} r{s}, 0x{m:X}", likely(l)),
            "0l0111_sssss_?????_mmmmm_mmmmm_mmmmmm" => format!("bgtz{} r{s}, 0x{m:X}", likely(l)),

            "001000_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("addi r{t}, r{s}, 0x{m:X}"),
            "001001_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("addiu r{t}, r{s}, 0x{m:X}"),
            "001010_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("slti r{t}, r{s}, 0x{m:X}"),
            "001011_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sltiu r{t}, r{s}, 0x{m:X}"),
            "001100_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("andi r{t}, r{s}, 0x{m:X}"),
            "001101_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("ori r{t}, r{s}, 0x{m:X}"),
            "001110_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("xori r{t}, r{s}, 0x{m:X}"),
            "001111_?????_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lui r{t}, 0x{m:X}"),
            "011000_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("daddi r{t}, r{s}, 0x{m:X}"),
            "011001_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("daddiu r{t}, r{s}, 0x{m:X}"),

            "010000_00000_ttttt_ddddd_?????_??????" => format!("mfc0 r{t}, {}", cop0_reg(d)),
            "010000_00001_ttttt_ddddd_?????_??????" => format!("dmfc0 r{t}, {}", cop0_reg(d)),
            "010000_00100_ttttt_ddddd_?????_??????" => format!("mtc0 r{t}, {}", cop0_reg(d)),
            "010000_00101_ttttt_ddddd_?????_??????" => format!("dmtc0 r{t}, {}", cop0_reg(d)),
            "010000_1????_?????_?????_?????_000001" => "tlbr".to_string(),
            "010000_1????_?????_?????_?????_000010" => "tlbwi".to_string(),
            "010000_1????_?????_?????_?????_000110" => "tlbwr".to_string(),
            "010000_1????_?????_?????_?????_001000" => "tlbp".to_string(),
            "010000_1????_?????_?????_?????_011000" => "eret".to_string(),

            "010001_00000_ttttt_sssss_?????_??????" => format!("mfc1 r{t}, f{s}"),
            "010001_00001_ttttt_sssss_?????_??????" => format!("dmfc1 r{t}, f{s}"),
            "010001_00010_ttttt_sssss_?????_??????" => format!("cfc1 r{t}, fcr{s}"),
            "010001_00100_ttttt_sssss_?????_??????" => format!("mtc1 r{t}, f{s}"),
            "010001_00101_ttttt_sssss_?????_??????" => format!("dmtc1 r{t}, f{s}"),
            "010001_00110_ttttt_sssss_?????_??????" => format!("ctc1 r{t}, fcr{s}"),
            "010001_01000_???lt_mmmmm_mmmmm_mmmmmm" => {
                let cond = if t == 1 { "t" } else { "f" };
                format!("bc1{cond}{} 0x{m:X}", likely(l))
            }
            "010001_fffff_ttttt_sssss_ddddd_oooooo" => {
                format!("cop1.{}.{} f{d}, f{s}, f{t}", float_fmt(f), o)
            }
            "0100nn_?????_?????_?????_?????_??????" => format!("cop{n} 0x{:X}", inst & 0x3FF_FFFF),

            "100000_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lb r{t}, [r{s}+0x{m:X}]"),
            "100001_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lh r{t}, [r{s}+0x{m:X}]"),
            "100010_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lwl r{t}, [r{s}+0x{m:X}]"),
            "100011_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lw r{t}, [r{s}+0x{m:X}]"),
            "100100_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lbu r{t}, [r{s}+0x{m:X}]"),
            "100101_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lhu r{t}, [r{s}+0x{m:X}]"),
            "100110_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lwr r{t}, [r{s}+0x{m:X}]"),
            "100111_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lwu r{t}, [r{s}+0x{m:X}]"),
            "011010_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("ldl r{t}, [r{s}+0x{m:X}]"),
            "011011_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("ldr r{t}, [r{s}+0x{m:X}]"),
            "110111_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("ld r{t}, [r{s}+0x{m:X}]"),
            "110000_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("ll r{t}, [r{s}+0x{m:X}]"),
            "110100_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lld r{t}, [r{s}+0x{m:X}]"),
            "110001_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("lwc1 f{t}, [r{s}+0x{m:X}]"),
            "110101_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("ldc1 f{t}, [r{s}+0x{m:X}]"),

            "101000_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sb r{t}, [r{s}+0x{m:X}]"),
            "101001_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sh r{t}, [r{s}+0x{m:X}]"),
            "101010_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("swl r{t}, [r{s}+0x{m:X}]"),
            "101011_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sw r{t}, [r{s}+0x{m:X}]"),
            "101100_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sdl r{t}, [r{s}+0x{m:X}]"),
            "101101_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sdr r{t}, [r{s}+0x{m:X}]"),
            "101110_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("swr r{t}, [r{s}+0x{m:X}]"),
            "101111_sssss_ooooo_mmmmm_mmmmm_mmmmmm" => format!("cache 0x{o:X}, [r{s}+0x{m:X}]"),
            "111000_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sc r{t}, [r{s}+0x{m:X}]"),
            "111100_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("scd r{t}, [r{s}+0x{m:X}]"),
            "111001_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("swc1 f{t}, [r{s}+0x{m:X}]"),
            "111101_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sdc1 f{t}, [r{s}+0x{m:X}]"),
            "111111_sssss_ttttt_mmmmm_mmmmm_mmmmmm" => format!("sd r{t}, [r{s}+0x{m:X}]"),

            _ => format!("{inst:08X}??"),
        }
    }
}

fn likely(l: u32) -> &'static str {
    if l == 1 {
        "l"
    } else {
        ""
    }
}

fn regimm_branch(kind: u32, link: bool) -> String {
    let name = if kind & 1 == 1 { "bgez" } else { "bltz" };
    let link = if link { "al" } else { "" };
    format!("{name}{link}{}", likely(kind >> 1))
}

fn trap_cond(cond: u32) -> &'static str {
    match cond {
        0 => "ge",
        1 => "geu",
        2 => "lt",
        3 => "ltu",
        4 => "eq",
        6 => "ne",
        _ => "??",
    }
}

fn float_fmt(fmt: u32) -> &'static str {
    match fmt {
        0x10 => "s",
        0x11 => "d",
        0x14 => "w",
        0x15 => "l",
        _ => "?",
    }
}

fn cop0_reg(reg: u32) -> &'static str {
    const NAMES: [&str; 32] = [
        "Index", "Random", "EntryLo0", "EntryLo1", "Context", "PageMask", "Wired", "r7",
        "BadVAddr", "Count", "EntryHi", "Compare", "Status", "Cause", "EPC", "PRId", "Config",
        "LLAddr", "WatchLo", "WatchHi", "XContext", "r21", "r22", "r23", "r24", "r25",
        "ParityError", "CacheError", "TagLo", "TagHi", "ErrorEPC", "r31",
    ];
    NAMES[(reg & 0x1F) as usize]
}
